//! Status service - counts across the quill database

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::JobStatus;
use crate::ports::Repository;

pub struct StatusService {
    repository: Arc<dyn Repository>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn get_status(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            total_users: self.repository.count_users()?,
            total_identities: self.repository.count_identities()?,
            total_organizations: self.repository.count_organizations()?,
            total_follows: self.repository.count_follows()?,
            jobs: JobCounts {
                pending: self.repository.count_jobs(JobStatus::Pending)?,
                done: self.repository.count_jobs(JobStatus::Done)?,
                failed: self.repository.count_jobs(JobStatus::Failed)?,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_identities: i64,
    pub total_organizations: i64,
    pub total_follows: i64,
    pub jobs: JobCounts,
}

#[derive(Debug, Serialize)]
pub struct JobCounts {
    pub pending: i64,
    pub done: i64,
    pub failed: i64,
}
