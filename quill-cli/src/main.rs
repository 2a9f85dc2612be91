//! Quill CLI - users, identities and social logins from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{follow, jobs, logs, org, register, status, user};

/// Env var holding the tracing filter, e.g. `QUILL_LOG=quill_core=debug`
const LOG_FILTER_ENV: &str = "QUILL_LOG";

/// Quill - user and identity administration
#[derive(Parser)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database counts and job queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a social-login payload to a user, registering if needed
    Register {
        /// Path to the payload JSON, or "-" for stdin
        payload: PathBuf,
        /// Signup call-to-action variant for new accounts
        #[arg(long)]
        variant: Option<String>,
        /// Link to this already signed-in user (username or id)
        #[arg(long = "as", value_name = "USER")]
        current_user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Manage organizations
    Org {
        #[command(subcommand)]
        command: org::OrgCommands,
    },

    /// Follow users, tags and organizations
    Follow {
        #[command(subcommand)]
        command: follow::FollowCommands,
    },

    /// Inspect and run deferred jobs
    Jobs {
        #[command(subcommand)]
        command: jobs::JobsCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Register {
            payload,
            variant,
            current_user,
            json,
        } => register::run(&payload, variant.as_deref(), current_user.as_deref(), json),
        Commands::User { command } => user::run(command),
        Commands::Org { command } => org::run(command),
        Commands::Follow { command } => follow::run(command),
        Commands::Jobs { command } => jobs::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
