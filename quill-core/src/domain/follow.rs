//! Follow graph: tags and follows

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::ValidationErrors;

pub const TAG_MAX_LEN: usize = 30;

/// A topic users can follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Create a tag, normalizing the name
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: Self::normalize_name(name),
            created_at: Utc::now(),
        }
    }

    /// Lowercase, alphanumerics only (`#Rust-Lang` -> `rustlang`)
    pub fn normalize_name(name: &str) -> String {
        name.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add("name", "can't be blank");
        } else if self.name.len() > TAG_MAX_LEN {
            errors.add(
                "name",
                format!("is too long (maximum is {} characters)", TAG_MAX_LEN),
            );
        }
        errors
    }
}

/// Anything a user can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Followable {
    User(Uuid),
    Tag(Uuid),
    Organization(Uuid),
}

impl Followable {
    /// Stored type name
    pub fn kind(&self) -> &'static str {
        match self {
            Followable::User(_) => "user",
            Followable::Tag(_) => "tag",
            Followable::Organization(_) => "organization",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Followable::User(id) | Followable::Tag(id) | Followable::Organization(id) => *id,
        }
    }

    /// Rebuild from stored type name and id
    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "user" => Some(Followable::User(id)),
            "tag" => Some(Followable::Tag(id)),
            "organization" => Some(Followable::Organization(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Followable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// A user following something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: Uuid,
    pub followable: Followable,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: Uuid, followable: Followable) -> Self {
        Self {
            follower_id,
            followable,
            created_at: Utc::now(),
        }
    }
}
