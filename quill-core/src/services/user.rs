//! User service - validation, profile edits and account removal

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::user::normalize_optional;
use crate::domain::{Identity, JobKind, Provider, User, ValidationErrors};
use crate::ports::{JobQueue, NamespaceOwner, Repository};
use crate::services::jobs::enqueue_detached;

/// Requested profile changes. `None` leaves a field alone; a blank string
/// clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub website_url: Option<String>,
    pub employer_url: Option<String>,
    pub profile_image_url: Option<String>,
    pub location: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.name.is_none()
            && self.summary.is_none()
            && self.website_url.is_none()
            && self.employer_url.is_none()
            && self.profile_image_url.is_none()
            && self.location.is_none()
    }

    fn apply(self, user: &mut User) {
        if let Some(username) = self.username {
            user.rename(username.trim());
        }
        let fields = [
            (self.email, &mut user.email),
            (self.name, &mut user.name),
            (self.summary, &mut user.summary),
            (self.website_url, &mut user.website_url),
            (self.employer_url, &mut user.employer_url),
            (self.profile_image_url, &mut user.profile_image_url),
            (self.location, &mut user.location),
        ];
        for (value, slot) in fields {
            if value.is_some() {
                *slot = normalize_optional(value);
            }
        }
    }
}

pub struct UserService {
    repository: Arc<dyn Repository>,
    jobs: Arc<dyn JobQueue>,
}

impl UserService {
    pub fn new(repository: Arc<dyn Repository>, jobs: Arc<dyn JobQueue>) -> Self {
        Self { repository, jobs }
    }

    /// Check every rule for `user`, including the ones that need the
    /// database. All failures are reported together.
    pub fn validate(&self, user: &User) -> Result<()> {
        Ok(self.collect_errors(user, true)?.into_result()?)
    }

    /// Every rule except username availability, which registration leaves
    /// to the namespace claim made when the user is inserted
    pub(crate) fn validate_for_registration(&self, user: &User) -> Result<()> {
        Ok(self.collect_errors(user, false)?.into_result()?)
    }

    fn collect_errors(&self, user: &User, check_namespace: bool) -> Result<ValidationErrors> {
        let saved = self.repository.get_user(user.id)?;
        let mut errors = user.validate(saved.as_ref());

        if check_namespace && !errors.has("username") {
            match self.repository.namespace_owner(&user.username)? {
                Some(NamespaceOwner::User(id)) if id == user.id => {}
                Some(_) => errors.add("username", "has already been taken"),
                None => {}
            }
        }

        errors.merge(self.provider_handle_errors(user)?);
        Ok(errors)
    }

    /// Cached provider handles are unique among users when present
    fn provider_handle_errors(&self, user: &User) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for provider in Provider::ALL {
            let Some(handle) = user.provider_username(provider) else {
                continue;
            };
            if handle.trim().is_empty() {
                continue;
            }
            if let Some(other) = self.repository.find_user_by_provider_username(provider, handle)? {
                if other.id != user.id {
                    errors.add(
                        format!("{}_username", provider.as_str()),
                        "has already been taken",
                    );
                }
            }
        }
        Ok(errors)
    }

    pub fn get(&self, id: Uuid) -> Result<User> {
        self.repository
            .get_user(id)?
            .ok_or_else(|| Error::not_found(format!("User {}", id)))
    }

    /// Case-insensitive lookup
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.repository.find_user_by_username(username.trim())
    }

    pub fn list(&self) -> Result<Vec<User>> {
        self.repository.list_users()
    }

    pub fn identities(&self, id: Uuid) -> Result<Vec<Identity>> {
        self.repository.identities_for_user(id)
    }

    /// Apply `update`, validate and save.
    ///
    /// A new username shifts the old one into the history and moves the
    /// namespace claim. The search index is refreshed afterwards.
    pub fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User> {
        let mut user = self.get(id)?;
        if update.is_empty() {
            return Ok(user);
        }

        update.apply(&mut user);
        user.updated_at = Utc::now();
        self.validate(&user)?;

        self.repository.update_user(&user).map_err(|e| match e {
            // Lost a race for the name between validation and the write
            Error::Conflict(_) => Error::invalid("username", "has already been taken"),
            other => other,
        })?;

        enqueue_detached(self.jobs.as_ref(), JobKind::IndexUser, user.id);
        Ok(user)
    }

    /// Remove the account and everything hanging off it. The freed username
    /// can be claimed again immediately.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.repository.delete_user(id)?;
        enqueue_detached(self.jobs.as_ref(), JobKind::RemoveUserFromIndex, id);
        Ok(())
    }
}
