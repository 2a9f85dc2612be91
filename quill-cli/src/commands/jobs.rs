//! Jobs commands - inspect and run the deferred job queue

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use quill_core::domain::JobStatus;
use quill_core::services::LogEvent;

use super::{get_context, get_logger, log_event};
use crate::output::{self, create_table, format_time, or_dash};

#[derive(Subcommand)]
pub enum JobsCommands {
    /// Show recent jobs
    List {
        /// Number of jobs to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only pending jobs
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run pending jobs against the configured collaborators
    Run {
        /// Maximum number of jobs to run
        #[arg(short, long, default_value = "100")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: JobsCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        JobsCommands::List { limit, pending, json } => {
            let jobs = if pending {
                ctx.job_service.pending(limit)?
            } else {
                ctx.job_service.recent(limit)?
            };
            if json {
                return output::json(&jobs);
            }
            if jobs.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Kind", "User", "Status", "Attempts", "Updated", "Error"]);
            for job in &jobs {
                let status = match job.status {
                    JobStatus::Failed => job.status.as_str().red().to_string(),
                    JobStatus::Pending => job.status.as_str().yellow().to_string(),
                    _ => job.status.as_str().to_string(),
                };
                table.add_row(vec![
                    job.kind.to_string(),
                    job.user_id.to_string(),
                    status,
                    job.attempts.to_string(),
                    format_time(&job.updated_at),
                    or_dash(job.last_error.as_deref()),
                ]);
            }
            println!("{}", table);
        }

        JobsCommands::Run { limit, json } => {
            let logger = get_logger();
            let report = ctx.job_service.run_pending(limit)?;

            let mut event = LogEvent::new("jobs_run").with_command("jobs run");
            if report.failed > 0 {
                event = event.with_error(format!("{} of {} jobs failed", report.failed, report.processed));
            }
            log_event(&logger, event);

            if json {
                return output::json(&report);
            }
            if report.processed == 0 {
                println!("No pending jobs.");
                return Ok(());
            }

            output::success(&format!("Ran {} jobs", report.processed));
            println!("  Done:    {}", report.done);
            if report.skipped > 0 {
                println!("  {}", format!("Skipped: {} (collaborator not configured)", report.skipped).dimmed());
            }
            if report.failed > 0 {
                output::warning(&format!("  Failed:  {}", report.failed));
            }
        }
    }

    Ok(())
}
