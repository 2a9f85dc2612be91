//! User domain model

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::identity::{Provider, ProviderProfile};
use super::validation::ValidationErrors;

pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 30;
pub const NAME_MAX_LEN: usize = 100;
pub const SUMMARY_MAX_LEN: usize = 200;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid username pattern"))
}

/// A member of the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub website_url: Option<String>,
    pub employer_url: Option<String>,
    pub profile_image_url: Option<String>,
    pub location: Option<String>,

    // =========================================================================
    // Username history (two deep, shifted on every rename)
    // =========================================================================
    pub old_username: Option<String>,
    pub old_old_username: Option<String>,

    // =========================================================================
    // Registration
    // =========================================================================
    /// Experiment tag recorded only when the account is created
    pub signup_cta_variant: Option<String>,
    pub saw_onboarding: bool,
    pub estimated_default_language: Option<String>,

    // =========================================================================
    // Twitter: cached from the linked identity
    // =========================================================================
    pub twitter_username: Option<String>,
    pub twitter_followers_count: i64,
    pub twitter_following_count: i64,
    pub twitter_created_at: Option<DateTime<Utc>>,

    // =========================================================================
    // GitHub: cached from the linked identity
    // =========================================================================
    pub github_username: Option<String>,
    pub github_followers_count: i64,
    pub github_following_count: i64,
    pub github_created_at: Option<DateTime<Utc>>,

    // =========================================================================
    // Follow counters
    // =========================================================================
    pub following_users_count: i64,
    pub following_tags_count: i64,
    pub following_orgs_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with required fields
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: username.into(),
            email: None,
            name: None,
            summary: None,
            website_url: None,
            employer_url: None,
            profile_image_url: None,
            location: None,
            // History
            old_username: None,
            old_old_username: None,
            // Registration
            signup_cta_variant: None,
            saw_onboarding: true,
            estimated_default_language: None,
            // Twitter
            twitter_username: None,
            twitter_followers_count: 0,
            twitter_following_count: 0,
            twitter_created_at: None,
            // GitHub
            github_username: None,
            github_followers_count: 0,
            github_following_count: 0,
            github_created_at: None,
            // Counters
            following_users_count: 0,
            following_tags_count: 0,
            following_orgs_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the signup experiment tag for a brand-new account.
    ///
    /// A blank tag counts as no tag. Users who arrived through a tagged call
    /// to action still have onboarding ahead of them.
    pub fn assign_signup_variant(&mut self, variant: Option<&str>) {
        let variant = variant.map(str::trim).filter(|v| !v.is_empty());
        self.signup_cta_variant = variant.map(str::to_string);
        self.saw_onboarding = variant.is_none();
    }

    /// Change the username, shifting the previous names down the history.
    ///
    /// Returns false (and leaves history alone) when the name is unchanged.
    pub fn rename(&mut self, new_username: impl Into<String>) -> bool {
        let new_username = new_username.into();
        if new_username == self.username {
            return false;
        }
        let previous = std::mem::replace(&mut self.username, new_username);
        self.old_old_username = self.old_username.take();
        self.old_username = Some(previous);
        true
    }

    /// Copy normalized provider fields onto the provider-specific columns
    pub fn apply_provider_profile(&mut self, provider: Provider, profile: &ProviderProfile) {
        match provider {
            Provider::Twitter => {
                self.twitter_username = profile.username.clone();
                self.twitter_followers_count = profile.followers_count;
                self.twitter_following_count = profile.following_count;
                self.twitter_created_at = profile.created_at;
            }
            Provider::Github => {
                self.github_username = profile.username.clone();
                self.github_followers_count = profile.followers_count;
                self.github_following_count = profile.following_count;
                self.github_created_at = profile.created_at;
            }
        }
    }

    /// Cached handle for a provider
    pub fn provider_username(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Twitter => self.twitter_username.as_deref(),
            Provider::Github => self.github_username.as_deref(),
        }
    }

    /// Validate the record on its own.
    ///
    /// `saved` is the currently persisted version, if any. The summary bound
    /// only applies when the summary differs from the saved one, so an
    /// over-long summary from before the rule existed stays valid until edited.
    /// Uniqueness rules need the repository and live in the user service.
    pub fn validate(&self, saved: Option<&User>) -> ValidationErrors {
        let mut errors = validate_handle("username", &self.username);

        if let Some(name) = &self.name {
            if name.chars().count() > NAME_MAX_LEN {
                errors.add(
                    "name",
                    format!("is too long (maximum is {} characters)", NAME_MAX_LEN),
                );
            }
        }

        let summary_changed = saved.map_or(true, |s| s.summary != self.summary);
        if summary_changed {
            if let Some(summary) = &self.summary {
                if summary.chars().count() > SUMMARY_MAX_LEN {
                    errors.add(
                        "summary",
                        format!("is too long (maximum is {} characters)", SUMMARY_MAX_LEN),
                    );
                }
            }
        }

        for (field, value) in [
            ("website_url", &self.website_url),
            ("employer_url", &self.employer_url),
        ] {
            if let Some(url) = value {
                if !is_web_url(url) {
                    errors.add(field, "must be a valid http:// or https:// URL");
                }
            }
        }

        errors
    }
}

/// Format and length rules shared by usernames and organization slugs
pub fn validate_handle(field: &str, value: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let len = value.chars().count();

    if value.trim().is_empty() {
        errors.add(field, "can't be blank");
        return errors;
    }
    if len < USERNAME_MIN_LEN {
        errors.add(
            field,
            format!("is too short (minimum is {} characters)", USERNAME_MIN_LEN),
        );
    }
    if len > USERNAME_MAX_LEN {
        errors.add(
            field,
            format!("is too long (maximum is {} characters)", USERNAME_MAX_LEN),
        );
    }
    if !username_pattern().is_match(value) {
        errors.add(field, "may only contain letters, digits and underscores");
    }
    errors
}

/// True if `value` passes every username format and length rule
pub fn is_valid_username(value: &str) -> bool {
    validate_handle("username", value).is_empty()
}

/// Strip characters outside the username charset and cap the length
pub fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(USERNAME_MAX_LEN)
        .collect()
}

/// Case-insensitive key used by the shared username/slug namespace
pub fn namespace_key(handle: &str) -> String {
    handle.to_lowercase()
}

/// Turn blank optional text into `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Absolute `http`/`https` URL with a host
pub fn is_web_url(value: &str) -> bool {
    let lower = value.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    match Url::parse(value) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}
