//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod collaborators;
mod repository;

pub use collaborators::{CallOutcome, Newsletter, NewsletterSubscription, SearchIndex, UserDocument};
pub use repository::{JobQueue, NamespaceOwner, Repository};
