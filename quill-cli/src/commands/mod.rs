//! CLI command implementations

pub mod follow;
pub mod jobs;
pub mod logs;
pub mod org;
pub mod register;
pub mod status;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use quill_core::services::{EntryPoint, LogEvent, LoggingService};
use quill_core::{QuillContext, User};

/// Env var overriding the quill directory
const QUILL_DIR_ENV: &str = "QUILL_DIR";

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let quill_dir = get_quill_dir().ok()?;
    std::fs::create_dir_all(&quill_dir).ok()?;
    LoggingService::new(&quill_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!("failed to write log entry: {}", e);
        }
    }
}

/// Get the quill directory from environment or default
pub fn get_quill_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(QUILL_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".quill"))
        .ok_or_else(|| anyhow!("Could not find home directory; set {}", QUILL_DIR_ENV))
}

/// Get or create quill context
pub fn get_context() -> Result<QuillContext> {
    let quill_dir = get_quill_dir()?;

    std::fs::create_dir_all(&quill_dir)
        .with_context(|| format!("Failed to create quill directory: {:?}", quill_dir))?;

    QuillContext::new(&quill_dir).context("Failed to initialize quill context")
}

/// Look a user up by id or by username
pub fn find_user(ctx: &QuillContext, key: &str) -> Result<User> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(ctx.user_service.get(id)?);
    }
    ctx.user_service
        .find_by_username(key)?
        .ok_or_else(|| anyhow!("User '{}' not found", key))
}
