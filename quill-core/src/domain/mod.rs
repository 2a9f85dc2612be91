//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod follow;
mod identity;
mod job;
mod organization;
pub mod result;
pub mod user;
pub mod validation;

pub use follow::{Follow, Followable, Tag};
pub use identity::{AuthCredentials, AuthExtra, AuthInfo, AuthPayload, Identity, Provider, ProviderProfile};
pub use job::{Job, JobKind, JobStatus};
pub use organization::Organization;
pub use user::User;
pub use validation::{FieldError, ValidationErrors};
