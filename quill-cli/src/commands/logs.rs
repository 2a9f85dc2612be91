//! Logs command - login outcomes and admin actions from the event log

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::json;

use quill_core::services::{EntryPoint, LogEntry, LogFilter, LoggingService};

use super::get_quill_dir;
use crate::output::{self, create_table, format_size, or_dash};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only this event, e.g. registered, linked_by_email, register_failed
        #[arg(long)]
        event: Option<String>,
        /// Only this login provider
        #[arg(long)]
        provider: Option<String>,
        /// Only failures
        #[arg(long)]
        errors: bool,
        /// Only the last N days
        #[arg(long, value_name = "DAYS")]
        since_days: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count events by name
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old events
    Prune {
        /// Delete events older than N days
        #[arg(long, default_value = "30")]
        older_than_days: i64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

fn open_log() -> Result<LoggingService> {
    let quill_dir = get_quill_dir()?;
    std::fs::create_dir_all(&quill_dir)?;
    LoggingService::new(&quill_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn days_ago_ms(days: i64) -> i64 {
    (Utc::now() - Duration::days(days)).timestamp_millis()
}

fn when(entry: &LogEntry) -> String {
    Utc.timestamp_millis_opt(entry.timestamp)
        .single()
        .map(|dt| output::format_time(&dt))
        .unwrap_or_else(|| entry.timestamp.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::List {
            limit,
            event,
            provider,
            errors,
            since_days,
            json,
        } => {
            let filter = LogFilter {
                event,
                provider,
                errors_only: errors,
                since_ms: since_days.map(days_ago_ms),
            };
            let entries = log.entries(&filter, limit)?;

            if json {
                return output::json(&entries);
            }
            if entries.is_empty() {
                println!("No matching events.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Time", "Event", "Provider", "Command", "Error"]);
            for entry in &entries {
                let event = if entry.is_error() {
                    entry.event.red().to_string()
                } else {
                    entry.event.clone()
                };
                table.add_row(vec![
                    when(entry),
                    event,
                    or_dash(entry.provider.as_deref()),
                    or_dash(entry.command.as_deref()),
                    or_dash(entry.error_message.as_deref()),
                ]);
            }
            println!("{}", table);
        }

        LogsCommands::Stats { json } => {
            let counts = log.event_counts()?;
            let size_bytes = std::fs::metadata(log.db_path()).map(|m| m.len()).unwrap_or(0);

            if json {
                return output::json(&json!({
                    "events": counts,
                    "database_path": log.db_path(),
                    "database_size_bytes": size_bytes,
                }));
            }

            if counts.is_empty() {
                println!("No events recorded.");
            } else {
                let mut table = create_table();
                table.set_header(vec!["Event", "Total", "Failed"]);
                for count in &counts {
                    table.add_row(vec![
                        count.event.clone(),
                        count.total.to_string(),
                        count.errors.to_string(),
                    ]);
                }
                println!("{}", table);
            }
            println!(
                "{}",
                format!("{} ({})", log.db_path().display(), format_size(size_bytes)).dimmed()
            );
        }

        LogsCommands::Prune {
            older_than_days,
            force,
        } => {
            if !force
                && !Confirm::new()
                    .with_prompt(format!("Delete events older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            let deleted = log.delete_before(days_ago_ms(older_than_days))?;
            output::success(&format!("Deleted {} events", deleted));
        }
    }

    Ok(())
}
