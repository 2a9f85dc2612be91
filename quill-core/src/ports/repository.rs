//! Repository port - database abstraction

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Follow, Followable, Identity, Job, JobStatus, Organization, Provider, Tag, User};

/// Who holds a name in the shared username/slug namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceOwner {
    User(Uuid),
    Organization(Uuid),
}

/// Database repository abstraction
///
/// This trait defines all database operations. Implementations (adapters)
/// provide the actual database access logic. Name lookups are
/// case-insensitive. Writes that would break a unique key fail with
/// `Error::Conflict`.
pub trait Repository: Send + Sync {
    // === Users ===

    /// Get user by ID
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Get user by username
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by the cached handle of a linked provider
    fn find_user_by_provider_username(
        &self,
        provider: Provider,
        handle: &str,
    ) -> Result<Option<User>>;

    /// Get all users
    fn list_users(&self) -> Result<Vec<User>>;

    /// Insert a user, claiming its username in the namespace
    fn create_user(&self, user: &User) -> Result<()>;

    /// Insert a user and its first identity in one transaction
    fn create_user_with_identity(&self, user: &User, identity: &Identity) -> Result<()>;

    /// Persist every field of an existing user, moving the namespace claim
    /// when the username changed
    fn update_user(&self, user: &User) -> Result<()>;

    /// Delete a user with its identities, follows and namespace claim
    fn delete_user(&self, id: Uuid) -> Result<()>;

    // === Namespace ===

    /// Current holder of a username or slug
    fn namespace_owner(&self, handle: &str) -> Result<Option<NamespaceOwner>>;

    // === Identities ===

    /// Get identity by provider and provider account id
    fn find_identity(&self, provider: Provider, uid: &str) -> Result<Option<Identity>>;

    /// Get all identities of a user
    fn identities_for_user(&self, user_id: Uuid) -> Result<Vec<Identity>>;

    /// Link a new identity
    fn add_identity(&self, identity: &Identity) -> Result<()>;

    /// Link a new identity to an existing user and persist the user's
    /// refreshed provider fields, atomically
    fn attach_identity(&self, user: &User, identity: &Identity) -> Result<()>;

    // === Organizations ===

    /// Insert an organization, claiming its slug in the namespace
    fn create_organization(&self, org: &Organization) -> Result<()>;

    fn get_organization(&self, id: Uuid) -> Result<Option<Organization>>;

    fn find_organization_by_slug(&self, slug: &str) -> Result<Option<Organization>>;

    fn list_organizations(&self) -> Result<Vec<Organization>>;

    // === Tags ===

    fn create_tag(&self, tag: &Tag) -> Result<()>;

    fn get_tag(&self, id: Uuid) -> Result<Option<Tag>>;

    fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>>;

    // === Follows ===

    /// Record a follow and bump the follower's counter.
    ///
    /// Returns false when the follow already existed.
    fn add_follow(&self, follow: &Follow) -> Result<bool>;

    /// Remove a follow and lower the follower's counter.
    ///
    /// Returns false when there was nothing to remove.
    fn remove_follow(&self, follower_id: Uuid, followable: Followable) -> Result<bool>;

    /// Get everything a user follows
    fn follows_for_user(&self, follower_id: Uuid) -> Result<Vec<Follow>>;

    // === Jobs ===

    /// Oldest pending jobs first
    fn pending_jobs(&self, limit: usize) -> Result<Vec<Job>>;

    /// Most recent jobs first, any status
    fn recent_jobs(&self, limit: usize) -> Result<Vec<Job>>;

    /// Persist status, attempts and error of a job
    fn update_job(&self, job: &Job) -> Result<()>;

    // === Counts ===

    fn count_users(&self) -> Result<i64>;

    fn count_identities(&self) -> Result<i64>;

    fn count_organizations(&self) -> Result<i64>;

    fn count_follows(&self) -> Result<i64>;

    fn count_jobs(&self, status: JobStatus) -> Result<i64>;
}

/// Queue for deferred, fire-and-forget work
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: &Job) -> Result<()>;
}
