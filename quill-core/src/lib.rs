//! Quill Core - users, identities and social-login registration
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (User, Identity, Organization, Follow, Job)
//! - **ports**: Trait definitions for external dependencies (Repository, SearchIndex, Newsletter)
//! - **services**: Business logic orchestration (IdentityResolver, UserService, ...)
//! - **adapters**: Concrete implementations (DuckDB, HTTP)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::http::{HttpNewsletter, HttpSearchIndex};
use config::Config;
use ports::{JobQueue, Newsletter, Repository, SearchIndex};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{AuthPayload, Identity, Organization, Provider, User};
pub use services::{Resolution, ResolutionOutcome};

/// Database file inside the quill directory
pub const DB_FILENAME: &str = "quill.duckdb";

/// Main context for Quill operations
///
/// Opens the database, loads configuration and wires every service to the
/// same repository.
pub struct QuillContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub identity_resolver: IdentityResolver,
    pub user_service: UserService,
    pub organization_service: OrganizationService,
    pub follow_service: FollowService,
    pub job_service: JobService,
    pub status_service: StatusService,
}

impl QuillContext {
    pub fn new(quill_dir: &Path) -> Result<Self> {
        let config = Config::load(quill_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&quill_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let search_index: Arc<dyn SearchIndex> =
            Arc::new(HttpSearchIndex::new(config.search_index_url.as_deref())?);
        let newsletter: Arc<dyn Newsletter> = Arc::new(HttpNewsletter::new(
            config.newsletter_url.as_deref(),
            config.newsletter_list_id.as_deref(),
        )?);

        Ok(Self::with_collaborators(config, repository, search_index, newsletter))
    }

    /// Wire services around an open repository and the given collaborators
    pub fn with_collaborators(
        config: Config,
        repository: Arc<DuckDbRepository>,
        search_index: Arc<dyn SearchIndex>,
        newsletter: Arc<dyn Newsletter>,
    ) -> Self {
        let repo: Arc<dyn Repository> = repository.clone();
        let queue: Arc<dyn JobQueue> = repository.clone();

        let usernames = UsernameGenerator::new(Arc::clone(&repo))
            .with_suffix_attempts(config.username_suffix_attempts);

        Self {
            identity_resolver: IdentityResolver::new(Arc::clone(&repo), Arc::clone(&queue))
                .with_username_generator(usernames),
            user_service: UserService::new(Arc::clone(&repo), Arc::clone(&queue)),
            organization_service: OrganizationService::new(Arc::clone(&repo)),
            follow_service: FollowService::new(Arc::clone(&repo)),
            job_service: JobService::new(Arc::clone(&repo), queue, search_index, newsletter),
            status_service: StatusService::new(repo),
            config,
            repository,
        }
    }
}
