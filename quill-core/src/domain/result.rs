//! Result and error types for the core library

use thiserror::Error;

use super::validation::ValidationErrors;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A unique key (username namespace, provider link, follow) is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Search index, newsletter or other outside service failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Single-field validation error
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Field-level failures, if this is a validation error
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if is_constraint_violation(&msg) {
            Self::Conflict(msg)
        } else {
            Self::Database(msg)
        }
    }
}

/// Check if a database error message comes from a unique or primary key constraint
pub(crate) fn is_constraint_violation(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("duplicate key")
        || lower.contains("violates unique constraint")
        || lower.contains("violates primary key constraint")
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_builds_field_error() {
        let err = Error::invalid("username", "has already been taken");
        let errors = err.validation_errors().unwrap();
        assert!(errors.has("username"));
        assert!(err.to_string().contains("Validation failed"));
    }

    #[test]
    fn test_constraint_violation_detection() {
        assert!(is_constraint_violation(
            "Constraint Error: Duplicate key \"slug_key: ben\" violates primary key constraint."
        ));
        assert!(is_constraint_violation(
            "Constraint Error: Duplicate key \"provider: github, uid: 42\" violates unique constraint."
        ));
        assert!(!is_constraint_violation("Catalog Error: Table with name sys_users does not exist!"));
    }
}
