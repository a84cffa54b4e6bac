/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Permission-gated entry points over the store. The acting identity is
//! always passed in explicitly; there is no ambient "current user". The
//! caller has authenticated it already, this layer only authorizes.

use crate::community_db::{Comment, CommunityDb, Identity, Post};
use crate::error::{CoreError, CoreResult};
use crate::permissions::Permission;

#[derive(Clone)]
pub struct ContentService {
    db: CommunityDb,
}

impl ContentService {
    pub fn new(db: CommunityDb) -> Self {
        Self { db }
    }

    pub fn create_post(&self, actor: &Identity, body: &str) -> CoreResult<Post> {
        require(actor, Permission::Write)?;
        self.db.create_post(actor.id, body)
    }

    /// Authors may edit their own posts; administrators may edit any.
    pub fn edit_post(&self, actor: &Identity, post_id: i64, body: &str) -> CoreResult<Post> {
        let post = self
            .db
            .post_by_id(post_id)?
            .ok_or_else(|| CoreError::not_found(format!("post #{post_id}")))?;
        if post.author_id != actor.id && !actor.is_administrator() {
            return Err(CoreError::PermissionDenied("authorship or ADMIN"));
        }
        self.db.set_post_body(post_id, body)
    }

    pub fn create_comment(&self, actor: &Identity, post_id: i64, body: &str) -> CoreResult<Comment> {
        require(actor, Permission::Comment)?;
        self.db.create_comment(actor.id, post_id, body)
    }

    /// Hides or restores a comment without touching its body.
    pub fn moderate_comment(
        &self,
        actor: &Identity,
        comment_id: i64,
        disabled: bool,
    ) -> CoreResult<()> {
        require(actor, Permission::Moderate)?;
        self.db.set_comment_disabled(comment_id, disabled)
    }

    pub fn follow(&self, actor: &Identity, followed_id: i64) -> CoreResult<()> {
        require(actor, Permission::Follow)?;
        self.db.follow(actor.id, followed_id)
    }

    pub fn unfollow(&self, actor: &Identity, followed_id: i64) -> CoreResult<()> {
        require(actor, Permission::Follow)?;
        self.db.unfollow(actor.id, followed_id)
    }
}

fn require(actor: &Identity, perm: Permission) -> CoreResult<()> {
    if actor.can(perm) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied(perm.name()))
    }
}
