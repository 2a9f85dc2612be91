//! Organization commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output::{self, create_table, format_time};

#[derive(Subcommand)]
pub enum OrgCommands {
    /// Create an organization; the slug shares the username namespace
    Create {
        /// Display name
        name: String,
        /// URL slug
        #[arg(long)]
        slug: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List organizations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: OrgCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        OrgCommands::Create { name, slug, json } => {
            let org = ctx.organization_service.create(&name, &slug)?;
            if json {
                return output::json(&org);
            }
            output::success(&format!("Created {} ({})", org.name.bold(), org.slug));
        }
        OrgCommands::List { json } => {
            let orgs = ctx.organization_service.list()?;
            if json {
                return output::json(&orgs);
            }
            if orgs.is_empty() {
                println!("No organizations yet.");
                return Ok(());
            }
            let mut table = create_table();
            table.set_header(vec!["Slug", "Name", "Created"]);
            for org in &orgs {
                table.add_row(vec![org.slug.clone(), org.name.clone(), format_time(&org.created_at)]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
