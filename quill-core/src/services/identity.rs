//! Identity resolution for social login
//!
//! Maps a provider login to the application user to sign in:
//!
//! 1. A signed-in user gets the identity attached to their account.
//! 2. A known (provider, uid) returns its owner unchanged.
//! 3. An email matching an existing account links the identity to it.
//! 4. Otherwise a new user is registered with a username derived from the
//!    provider nickname.
//!
//! Attaching an identity also refreshes the user's cached provider fields
//! and queues a search-index update.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::user::{
    is_web_url, normalize_optional, sanitize_username, NAME_MAX_LEN, SUMMARY_MAX_LEN,
};
use crate::domain::{AuthPayload, Identity, JobKind, ProviderProfile, User};
use crate::ports::{JobQueue, Repository};
use crate::services::jobs::enqueue_detached;
use crate::services::{UserService, UsernameGenerator};

/// Persist attempts for a new user; a namespace conflict on the first one
/// is retried with a fresh suffixed name
const REGISTRATION_ATTEMPTS: usize = 2;

/// Keys of `info.urls` taken as the user's website, in order of preference
const WEBSITE_URL_KEYS: &[&str] = &["Website", "Blog"];

/// Which path produced the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// The (provider, uid) was already linked; nothing changed
    ExistingIdentity,
    LinkedToCurrentUser,
    LinkedByEmail,
    Registered,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExistingIdentity => "existing_identity",
            Self::LinkedToCurrentUser => "linked_to_current_user",
            Self::LinkedByEmail => "linked_by_email",
            Self::Registered => "registered",
        }
    }
}

/// The user to sign in and the identity that got them there
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub user: User,
    pub identity: Identity,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_new_user(&self) -> bool {
        self.outcome == ResolutionOutcome::Registered
    }
}

pub struct IdentityResolver {
    repository: Arc<dyn Repository>,
    jobs: Arc<dyn JobQueue>,
    users: UserService,
    usernames: UsernameGenerator,
}

impl IdentityResolver {
    pub fn new(repository: Arc<dyn Repository>, jobs: Arc<dyn JobQueue>) -> Self {
        Self {
            users: UserService::new(Arc::clone(&repository), Arc::clone(&jobs)),
            usernames: UsernameGenerator::new(Arc::clone(&repository)),
            repository,
            jobs,
        }
    }

    pub fn with_username_generator(mut self, usernames: UsernameGenerator) -> Self {
        self.usernames = usernames;
        self
    }

    /// Resolve a login to a persisted user.
    ///
    /// `current_user` is the already signed-in user, if any. `signup_variant`
    /// only affects brand-new accounts.
    pub fn resolve(
        &self,
        payload: &AuthPayload,
        current_user: Option<&User>,
        signup_variant: Option<&str>,
    ) -> Result<Resolution> {
        if payload.uid.trim().is_empty() {
            return Err(Error::invalid("uid", "can't be blank"));
        }

        if let Some(current) = current_user {
            return self.link_to_current_user(payload, current.id);
        }

        if let Some(identity) = self.repository.find_identity(payload.provider, &payload.uid)? {
            return self.existing(identity);
        }

        if let Some(email) = payload.email() {
            if let Some(user) = self.repository.find_user_by_email(email)? {
                self.ensure_provider_slot_free(&user, payload)?;
                return self.attach(user, payload, ResolutionOutcome::LinkedByEmail);
            }
        }

        self.register(payload, signup_variant)
    }

    fn existing(&self, identity: Identity) -> Result<Resolution> {
        let user = self
            .repository
            .get_user(identity.user_id)?
            .ok_or_else(|| Error::not_found(format!("User {}", identity.user_id)))?;
        Ok(Resolution {
            user,
            identity,
            outcome: ResolutionOutcome::ExistingIdentity,
        })
    }

    fn link_to_current_user(&self, payload: &AuthPayload, user_id: Uuid) -> Result<Resolution> {
        let user = self
            .repository
            .get_user(user_id)?
            .ok_or_else(|| Error::not_found(format!("User {}", user_id)))?;

        if let Some(identity) = self.repository.find_identity(payload.provider, &payload.uid)? {
            if identity.user_id == user.id {
                return Ok(Resolution {
                    user,
                    identity,
                    outcome: ResolutionOutcome::ExistingIdentity,
                });
            }
            return Err(Error::conflict(format!(
                "{} account {} is linked to another user",
                payload.provider, payload.uid
            )));
        }

        self.ensure_provider_slot_free(&user, payload)?;
        self.attach(user, payload, ResolutionOutcome::LinkedToCurrentUser)
    }

    /// A user links at most one account per provider
    fn ensure_provider_slot_free(&self, user: &User, payload: &AuthPayload) -> Result<()> {
        let taken = self
            .repository
            .identities_for_user(user.id)?
            .into_iter()
            .any(|i| i.provider == payload.provider);
        if taken {
            return Err(Error::conflict(format!(
                "{} already has a different {} account linked",
                user.username, payload.provider
            )));
        }
        Ok(())
    }

    fn attach(
        &self,
        mut user: User,
        payload: &AuthPayload,
        outcome: ResolutionOutcome,
    ) -> Result<Resolution> {
        let identity = Identity::from_payload(user.id, payload)?;
        user.apply_provider_profile(payload.provider, &payload.profile());
        user.updated_at = Utc::now();

        self.users.validate(&user)?;
        self.repository.attach_identity(&user, &identity)?;
        enqueue_detached(self.jobs.as_ref(), JobKind::IndexUser, user.id);

        tracing::debug!(user_id = %user.id, provider = %payload.provider, outcome = outcome.as_str(), "identity attached");
        Ok(Resolution {
            user,
            identity,
            outcome,
        })
    }

    fn register(&self, payload: &AuthPayload, signup_variant: Option<&str>) -> Result<Resolution> {
        let profile = payload.profile();
        let nickname = payload
            .info
            .nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(profile.username.as_deref());
        let base = sanitize_username(nickname.unwrap_or_default());

        let mut username = self.usernames.generate(nickname)?;
        for attempt in 1..=REGISTRATION_ATTEMPTS {
            let user = build_user(payload, &profile, username, signup_variant);
            let identity = Identity::from_payload(user.id, payload)?;

            let persisted = self
                .users
                .validate_for_registration(&user)
                .and_then(|()| self.repository.create_user_with_identity(&user, &identity));

            match persisted {
                Ok(()) => {
                    self.enqueue_followups(&user);
                    return Ok(Resolution {
                        user,
                        identity,
                        outcome: ResolutionOutcome::Registered,
                    });
                }
                // A concurrent login may have linked this account first
                Err(e @ (Error::Conflict(_) | Error::Validation(_))) => {
                    if let Some(existing) =
                        self.repository.find_identity(payload.provider, &payload.uid)?
                    {
                        return self.existing(existing);
                    }
                    if !e.is_conflict() {
                        return Err(e);
                    }
                    tracing::warn!(attempt, username = %user.username, "registration conflict: {}", e);
                    username = self.usernames.generate_suffixed(&base)?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Registration(format!(
            "could not claim a unique username for {} account {}",
            payload.provider, payload.uid
        )))
    }

    fn enqueue_followups(&self, user: &User) {
        let jobs = self.jobs.as_ref();
        enqueue_detached(jobs, JobKind::EstimateDefaultLanguage, user.id);
        enqueue_detached(jobs, JobKind::IndexUser, user.id);
        if user.email.is_some() {
            enqueue_detached(jobs, JobKind::SubscribeNewsletter, user.id);
        }
    }
}

/// New user populated from the login payload
fn build_user(
    payload: &AuthPayload,
    profile: &ProviderProfile,
    username: String,
    signup_variant: Option<&str>,
) -> User {
    let info = &payload.info;
    let mut user = User::new(Uuid::new_v4(), username);

    user.email = payload.email().map(str::to_string);
    user.name = truncated(normalize_optional(info.name.clone()), NAME_MAX_LEN);
    user.summary = truncated(normalize_optional(info.description.clone()), SUMMARY_MAX_LEN);
    user.location = normalize_optional(info.location.clone());
    user.profile_image_url = normalize_optional(info.image.clone());
    user.website_url = info.urls.as_ref().and_then(website_url);

    user.assign_signup_variant(signup_variant);
    user.apply_provider_profile(payload.provider, profile);
    user
}

fn truncated(value: Option<String>, max: usize) -> Option<String> {
    value.map(|v| v.chars().take(max).collect())
}

fn website_url(urls: &JsonValue) -> Option<String> {
    WEBSITE_URL_KEYS
        .iter()
        .filter_map(|key| urls.get(*key).and_then(JsonValue::as_str))
        .map(str::trim)
        .find(|url| is_web_url(url))
        .map(str::to_string)
}
