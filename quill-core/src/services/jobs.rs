//! Deferred work queued after user changes
//!
//! Producers enqueue and move on. `run_pending` drains the queue, calling
//! the locale estimator, search index and newsletter; a failing job is marked
//! `failed` with its error and never stops the run.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Job, JobKind, JobStatus};
use crate::ports::{
    CallOutcome, JobQueue, Newsletter, NewsletterSubscription, Repository, SearchIndex,
    UserDocument,
};
use crate::services::LocaleService;

/// Enqueue without letting a queue failure reach the caller
pub(crate) fn enqueue_detached(queue: &dyn JobQueue, kind: JobKind, user_id: Uuid) {
    let job = Job::new(kind, user_id);
    if let Err(e) = queue.enqueue(&job) {
        tracing::warn!(kind = %kind, user_id = %user_id, "failed to enqueue job: {}", e);
    }
}

/// Totals for one `run_pending` pass
#[derive(Debug, Default, Serialize)]
pub struct JobRunReport {
    pub processed: usize,
    pub done: usize,
    pub failed: usize,
    /// Done, but the collaborator was not configured
    pub skipped: usize,
}

pub struct JobService {
    repository: Arc<dyn Repository>,
    queue: Arc<dyn JobQueue>,
    locale: LocaleService,
    search_index: Arc<dyn SearchIndex>,
    newsletter: Arc<dyn Newsletter>,
}

impl JobService {
    pub fn new(
        repository: Arc<dyn Repository>,
        queue: Arc<dyn JobQueue>,
        search_index: Arc<dyn SearchIndex>,
        newsletter: Arc<dyn Newsletter>,
    ) -> Self {
        Self {
            locale: LocaleService::new(Arc::clone(&repository)),
            repository,
            queue,
            search_index,
            newsletter,
        }
    }

    pub fn enqueue(&self, kind: JobKind, user_id: Uuid) -> Result<Job> {
        let job = Job::new(kind, user_id);
        self.queue.enqueue(&job)?;
        Ok(job)
    }

    pub fn pending(&self, limit: usize) -> Result<Vec<Job>> {
        self.repository.pending_jobs(limit)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<Job>> {
        self.repository.recent_jobs(limit)
    }

    /// Run up to `limit` pending jobs, oldest first
    pub fn run_pending(&self, limit: usize) -> Result<JobRunReport> {
        let mut report = JobRunReport::default();

        for mut job in self.repository.pending_jobs(limit)? {
            job.attempts += 1;
            job.updated_at = Utc::now();

            match self.execute(&job) {
                Ok(outcome) => {
                    job.status = JobStatus::Done;
                    job.last_error = None;
                    report.done += 1;
                    if outcome == CallOutcome::Skipped {
                        report.skipped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, kind = %job.kind, "job failed: {}", e);
                    job.status = JobStatus::Failed;
                    job.last_error = Some(e.to_string());
                    report.failed += 1;
                }
            }

            self.repository.update_job(&job)?;
            report.processed += 1;
        }

        Ok(report)
    }

    fn execute(&self, job: &Job) -> Result<CallOutcome> {
        match job.kind {
            JobKind::RemoveUserFromIndex => self.search_index.remove_user(job.user_id),
            JobKind::EstimateDefaultLanguage => {
                if self.repository.get_user(job.user_id)?.is_none() {
                    return Ok(CallOutcome::Skipped);
                }
                self.locale.estimate_default_language(job.user_id)?;
                Ok(CallOutcome::Delivered)
            }
            JobKind::IndexUser => match self.repository.get_user(job.user_id)? {
                Some(user) => self.search_index.upsert_user(&UserDocument::from(&user)),
                None => Ok(CallOutcome::Skipped),
            },
            JobKind::SubscribeNewsletter => {
                let Some(user) = self.repository.get_user(job.user_id)? else {
                    return Ok(CallOutcome::Skipped);
                };
                let Some(email) = user.email.clone() else {
                    return Ok(CallOutcome::Skipped);
                };
                self.newsletter.subscribe(&NewsletterSubscription {
                    email,
                    username: user.username,
                    name: user.name,
                })
            }
        }
    }
}
