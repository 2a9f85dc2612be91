//! Outside services called after a user changes
//!
//! Calls are fire-and-forget from the caller's point of view: the job
//! runner records failures but nothing upstream waits on them.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::User;

/// What happened to a collaborator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Delivered,
    /// The collaborator is not configured; nothing was sent
    Skipped,
}

/// Public fields sent to the search index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDocument {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub profile_image_url: Option<String>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            summary: user.summary.clone(),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

/// A newsletter sign-up
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsletterSubscription {
    pub email: String,
    pub username: String,
    pub name: Option<String>,
}

/// Search index for user profiles
pub trait SearchIndex: Send + Sync {
    /// Insert or replace a user's document
    fn upsert_user(&self, doc: &UserDocument) -> Result<CallOutcome>;

    /// Drop a user's document
    fn remove_user(&self, user_id: Uuid) -> Result<CallOutcome>;
}

/// Mailing-list provider
pub trait Newsletter: Send + Sync {
    fn subscribe(&self, subscription: &NewsletterSubscription) -> Result<CallOutcome>;
}
