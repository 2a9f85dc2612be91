//! User commands - show, list, update and delete users

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::json;

use quill_core::services::{LogEvent, ProfileUpdate};

use super::{find_user, get_context, get_logger, log_event};
use crate::output::{self, create_table, format_time, or_dash};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user with linked identities and follows
    Show {
        /// Username or user id
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update profile fields; pass an empty string to clear one
    Update {
        /// Username or user id
        user: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        website_url: Option<String>,
        #[arg(long)]
        employer_url: Option<String>,
        #[arg(long)]
        profile_image_url: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a user with identities and follows
    Delete {
        /// Username or user id
        user: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub fn run(command: UserCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        UserCommands::List { json } => {
            let users = ctx.user_service.list()?;
            if json {
                return output::json(&users);
            }
            if users.is_empty() {
                println!("No users yet.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Username", "Email", "Name", "Created"]);
            for user in &users {
                table.add_row(vec![
                    user.username.clone(),
                    or_dash(user.email.as_deref()),
                    or_dash(user.name.as_deref()),
                    format_time(&user.created_at),
                ]);
            }
            println!("{}", table);
        }

        UserCommands::Show { user, json } => {
            let user = find_user(&ctx, &user)?;
            let identities = ctx.user_service.identities(user.id)?;
            let follows = ctx.follow_service.all_follows(user.id)?;

            if json {
                return output::json(&json!({
                    "user": user,
                    "identities": identities,
                    "follows": follows,
                }));
            }

            println!("{}", user.username.bold());
            let mut table = create_table();
            table.add_row(vec!["ID".to_string(), user.id.to_string()]);
            table.add_row(vec!["Email".to_string(), or_dash(user.email.as_deref())]);
            table.add_row(vec!["Name".to_string(), or_dash(user.name.as_deref())]);
            table.add_row(vec!["Summary".to_string(), or_dash(user.summary.as_deref())]);
            table.add_row(vec!["Website".to_string(), or_dash(user.website_url.as_deref())]);
            table.add_row(vec!["Location".to_string(), or_dash(user.location.as_deref())]);
            table.add_row(vec![
                "Previous names".to_string(),
                [user.old_username.as_deref(), user.old_old_username.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
            table.add_row(vec![
                "Signup variant".to_string(),
                or_dash(user.signup_cta_variant.as_deref()),
            ]);
            table.add_row(vec!["Saw onboarding".to_string(), user.saw_onboarding.to_string()]);
            table.add_row(vec![
                "Language".to_string(),
                or_dash(user.estimated_default_language.as_deref()),
            ]);
            table.add_row(vec![
                "Following".to_string(),
                format!(
                    "{} users, {} tags, {} orgs",
                    user.following_users_count, user.following_tags_count, user.following_orgs_count
                ),
            ]);
            table.add_row(vec!["Created".to_string(), format_time(&user.created_at)]);
            println!("{}", table);

            if !identities.is_empty() {
                println!();
                println!("{}", "Identities".bold());
                let mut table = create_table();
                table.set_header(vec!["Provider", "UID", "Handle", "Followers", "Linked"]);
                for identity in &identities {
                    let (handle, followers) = match identity.provider {
                        quill_core::Provider::Twitter => {
                            (user.twitter_username.as_deref(), user.twitter_followers_count)
                        }
                        quill_core::Provider::Github => {
                            (user.github_username.as_deref(), user.github_followers_count)
                        }
                    };
                    table.add_row(vec![
                        identity.provider.to_string(),
                        identity.uid.clone(),
                        or_dash(handle),
                        followers.to_string(),
                        format_time(&identity.created_at),
                    ]);
                }
                println!("{}", table);
            }
        }

        UserCommands::Update {
            user,
            username,
            email,
            name,
            summary,
            website_url,
            employer_url,
            profile_image_url,
            location,
            json,
        } => {
            let user = find_user(&ctx, &user)?;
            let update = ProfileUpdate {
                username,
                email,
                name,
                summary,
                website_url,
                employer_url,
                profile_image_url,
                location,
            };
            if update.is_empty() {
                output::warning("Nothing to update.");
                return Ok(());
            }

            let updated = ctx.user_service.update_profile(user.id, update)?;
            log_event(&get_logger(), LogEvent::new("user_updated").with_command("user update"));

            if json {
                return output::json(&updated);
            }
            output::success(&format!("Updated {}", updated.username.bold()));
            if updated.username != user.username {
                output::info(&format!("Renamed from {}", user.username));
            }
        }

        UserCommands::Delete { user, force } => {
            let user = find_user(&ctx, &user)?;

            if !force {
                println!(
                    "\n{}",
                    format!("This will delete '{}' with all linked identities and follows.", user.username)
                        .yellow()
                );
                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}\n", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            ctx.user_service.delete(user.id)?;
            log_event(&get_logger(), LogEvent::new("user_deleted").with_command("user delete"));
            output::success(&format!("User '{}' deleted", user.username));
        }
    }

    Ok(())
}
