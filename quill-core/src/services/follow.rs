//! Follow service - users following users, tags and organizations

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Follow, Followable, Tag};
use crate::ports::Repository;

pub struct FollowService {
    repository: Arc<dyn Repository>,
}

impl FollowService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Follow `target`. Returns false if already following.
    pub fn follow(&self, follower_id: Uuid, target: Followable) -> Result<bool> {
        if target == Followable::User(follower_id) {
            return Err(Error::invalid("followable", "can't follow yourself"));
        }
        if self.repository.get_user(follower_id)?.is_none() {
            return Err(Error::not_found(format!("User {}", follower_id)));
        }
        self.ensure_target_exists(target)?;

        self.repository.add_follow(&Follow::new(follower_id, target))
    }

    /// Stop following `target`. Returns false if there was no follow.
    pub fn unfollow(&self, follower_id: Uuid, target: Followable) -> Result<bool> {
        self.repository.remove_follow(follower_id, target)
    }

    pub fn all_follows(&self, follower_id: Uuid) -> Result<Vec<Follow>> {
        self.repository.follows_for_user(follower_id)
    }

    /// Find a tag by name, creating it on first use
    pub fn ensure_tag(&self, name: &str) -> Result<Tag> {
        let tag = Tag::new(Uuid::new_v4(), name);
        tag.validate().into_result()?;

        if let Some(existing) = self.repository.find_tag_by_name(&tag.name)? {
            return Ok(existing);
        }
        match self.repository.create_tag(&tag) {
            Ok(()) => Ok(tag),
            // Created by someone else in between
            Err(Error::Conflict(_)) => self
                .repository
                .find_tag_by_name(&tag.name)?
                .ok_or_else(|| Error::not_found(format!("Tag {}", tag.name))),
            Err(e) => Err(e),
        }
    }

    fn ensure_target_exists(&self, target: Followable) -> Result<()> {
        let exists = match target {
            Followable::User(id) => self.repository.get_user(id)?.is_some(),
            Followable::Tag(id) => self.repository.get_tag(id)?.is_some(),
            Followable::Organization(id) => self.repository.get_organization(id)?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(Error::not_found(target.to_string()))
        }
    }
}
