//! Follow commands - follow or unfollow users, tags and organizations

use anyhow::{anyhow, Result};
use clap::Subcommand;

use quill_core::domain::Followable;
use quill_core::QuillContext;

use super::{find_user, get_context};
use crate::output;

#[derive(Subcommand)]
pub enum FollowCommands {
    /// Follow another user
    User {
        /// Follower (username or id)
        follower: String,
        /// User to follow (username or id)
        target: String,
        /// Unfollow instead
        #[arg(long)]
        undo: bool,
    },
    /// Follow a tag, creating it if needed
    Tag {
        /// Follower (username or id)
        follower: String,
        /// Tag name
        tag: String,
        /// Unfollow instead
        #[arg(long)]
        undo: bool,
    },
    /// Follow an organization
    Org {
        /// Follower (username or id)
        follower: String,
        /// Organization slug
        slug: String,
        /// Unfollow instead
        #[arg(long)]
        undo: bool,
    },
}

pub fn run(command: FollowCommands) -> Result<()> {
    let ctx = get_context()?;

    let (follower, target, label, undo) = match command {
        FollowCommands::User { follower, target, undo } => {
            let target = find_user(&ctx, &target)?;
            (follower, Followable::User(target.id), target.username, undo)
        }
        FollowCommands::Tag { follower, tag, undo } => {
            let tag = ctx.follow_service.ensure_tag(&tag)?;
            (follower, Followable::Tag(tag.id), format!("#{}", tag.name), undo)
        }
        FollowCommands::Org { follower, slug, undo } => {
            let org = ctx
                .organization_service
                .find_by_slug(&slug)?
                .ok_or_else(|| anyhow!("Organization '{}' not found", slug))?;
            (follower, Followable::Organization(org.id), org.name, undo)
        }
    };

    apply(&ctx, &follower, target, &label, undo)
}

fn apply(ctx: &QuillContext, follower: &str, target: Followable, label: &str, undo: bool) -> Result<()> {
    let follower = find_user(ctx, follower)?;

    if undo {
        if ctx.follow_service.unfollow(follower.id, target)? {
            output::success(&format!("{} unfollowed {}", follower.username, label));
        } else {
            output::info(&format!("{} was not following {}", follower.username, label));
        }
    } else if ctx.follow_service.follow(follower.id, target)? {
        output::success(&format!("{} now follows {}", follower.username, label));
    } else {
        output::info(&format!("{} already follows {}", follower.username, label));
    }

    Ok(())
}
