//! Organization domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::validate_handle;
use super::validation::ValidationErrors;

/// A publishing organization.
///
/// The slug lives in the same case-insensitive namespace as usernames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(id: Uuid, name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate organization data
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = validate_handle("slug", &self.slug);
        if self.name.trim().is_empty() {
            errors.add("name", "can't be blank");
        }
        errors
    }
}
