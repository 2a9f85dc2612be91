//! Status command - show database counts and job queue state

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Quill Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Identities", &status.total_identities.to_string()]);
    table.add_row(vec!["Organizations", &status.total_organizations.to_string()]);
    table.add_row(vec!["Follows", &status.total_follows.to_string()]);

    println!("{}", table);
    println!();

    println!("{}", "Jobs".bold());
    println!("  Pending: {}", status.jobs.pending);
    println!("  Done:    {}", status.jobs.done);
    if status.jobs.failed > 0 {
        println!("  Failed:  {}", status.jobs.failed.to_string().red());
    } else {
        println!("  Failed:  0");
    }

    Ok(())
}
