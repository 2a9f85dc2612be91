//! Deferred work recorded for a user

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    EstimateDefaultLanguage,
    IndexUser,
    RemoveUserFromIndex,
    SubscribeNewsletter,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::EstimateDefaultLanguage => "estimate_default_language",
            JobKind::IndexUser => "index_user",
            JobKind::RemoveUserFromIndex => "remove_user_from_index",
            JobKind::SubscribeNewsletter => "subscribe_newsletter",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "estimate_default_language" => Ok(JobKind::EstimateDefaultLanguage),
            "index_user" => Ok(JobKind::IndexUser),
            "remove_user_from_index" => Ok(JobKind::RemoveUserFromIndex),
            "subscribe_newsletter" => Ok(JobKind::SubscribeNewsletter),
            other => Err(Error::Other(format!("Unknown job kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "done" => JobStatus::Done,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub user_id: Uuid,
    pub status: JobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            user_id,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_names() {
        for kind in [
            JobKind::EstimateDefaultLanguage,
            JobKind::IndexUser,
            JobKind::RemoveUserFromIndex,
            JobKind::SubscribeNewsletter,
        ] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("send_digest".parse::<JobKind>().is_err());
    }
}
