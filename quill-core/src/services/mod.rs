//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod follow;
mod identity;
pub mod jobs;
mod locale;
pub mod logging;
pub mod migration;
mod organization;
mod status;
mod user;
mod username;

pub use follow::FollowService;
pub use identity::{IdentityResolver, Resolution, ResolutionOutcome};
pub use jobs::{JobRunReport, JobService};
pub use locale::LocaleService;
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LogFilter, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use organization::OrganizationService;
pub use status::{JobCounts, StatusService, StatusSummary};
pub use user::{ProfileUpdate, UserService};
pub use username::{UsernameGenerator, DEFAULT_SUFFIX_ATTEMPTS};
