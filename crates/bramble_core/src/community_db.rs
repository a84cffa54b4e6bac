/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! The shared relational store behind the identity/content subsystem:
//! roles, identities, the follow graph, posts and comments.
//!
//! One `CommunityDb` value holds the database path; every operation opens
//! its own connection, so the store is safe to share across request-handling
//! threads. Uniqueness lives in the schema; violations surface as
//! `CoreError::Conflict`, never as crashes.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use sha2::Digest as _;

use crate::error::{CoreError, CoreResult};
use crate::permissions::{self, Permission, DEFAULT_ROLES};
use crate::render;

#[derive(Clone)]
pub struct CommunityDb {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: u32,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub role_id: i64,
    pub role_name: String,
    pub role_permissions: u32,
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub avatar_hash: String,
    pub created_at_ms: i64,
    pub last_seen_ms: i64,
}

impl Identity {
    /// An identity can do what its role's bits allow; nothing more.
    pub fn can(&self, perm: Permission) -> bool {
        permissions::has_permission(self.role_permissions, perm)
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::Admin)
    }
}

/// `body_rendered` is derived from `body` on every write; the store never
/// accepts it independently.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub body: String,
    pub body_rendered: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub body: String,
    pub body_rendered: String,
    pub disabled: bool,
    pub created_at_ms: i64,
}

/// One directed edge of the follow graph, joined with the counterpart's name.
#[derive(Debug, Clone)]
pub struct FollowEntry {
    pub identity_id: i64,
    pub username: String,
    pub since_ms: i64,
}

/// Stable identifier derived from the email, for avatar services.
pub fn avatar_hash_for(email: &str) -> String {
    let mut h = sha2::Sha256::new();
    h.update(email.trim().to_ascii_lowercase().as_bytes());
    hex::encode(h.finalize())
}

impl CommunityDb {
    pub fn open(db_path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS roles (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL UNIQUE,
              permissions INTEGER NOT NULL DEFAULT 0,
              is_default INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_roles_default ON roles(is_default);

            CREATE TABLE IF NOT EXISTS identities (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              username TEXT NOT NULL UNIQUE,
              email TEXT NOT NULL UNIQUE,
              password_hash TEXT NOT NULL,
              confirmed INTEGER NOT NULL DEFAULT 0,
              role_id INTEGER NOT NULL REFERENCES roles(id),
              display_name TEXT NULL,
              location TEXT NULL,
              about_me TEXT NULL,
              avatar_hash TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              last_seen_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS follows (
              follower_id INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
              followed_id INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
              created_at_ms INTEGER NOT NULL,
              PRIMARY KEY(follower_id, followed_id)
            );
            CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed_id, created_at_ms);

            CREATE TABLE IF NOT EXISTS posts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              author_id INTEGER NOT NULL REFERENCES identities(id),
              body TEXT NOT NULL,
              body_rendered TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at_ms DESC);
            CREATE INDEX IF NOT EXISTS idx_posts_author_created ON posts(author_id, created_at_ms DESC);

            CREATE TABLE IF NOT EXISTS comments (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
              author_id INTEGER NOT NULL REFERENCES identities(id),
              body TEXT NOT NULL,
              body_rendered TEXT NOT NULL,
              disabled INTEGER NOT NULL DEFAULT 0,
              created_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post_created ON comments(post_id, created_at_ms);
            "#,
        )?;
        Ok(Self { path })
    }

    fn conn(&self) -> CoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    pub fn health_check(&self) -> CoreResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ── Roles ───────────────────────────────────────────────────────────

    /// Creates or updates the built-in roles. Bits are overwritten, not
    /// merged, so re-running converges to the same three rows, with exactly
    /// one default.
    pub fn seed_default_roles(&self) -> CoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE roles SET is_default=0", [])?;
        for tpl in DEFAULT_ROLES {
            tx.execute(
                r#"
                INSERT INTO roles(name, permissions, is_default)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                  permissions=excluded.permissions,
                  is_default=excluded.is_default
                "#,
                params![tpl.name, tpl.permissions, tpl.is_default as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn role_by_name(&self, name: &str) -> CoreResult<Role> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, permissions, is_default FROM roles WHERE name=?1",
            params![name],
            map_role,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("role {name:?}")))
    }

    pub fn role_by_id(&self, id: i64) -> CoreResult<Role> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, permissions, is_default FROM roles WHERE id=?1",
            params![id],
            map_role,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found(format!("role #{id}")))
    }

    pub fn default_role(&self) -> CoreResult<Role> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, permissions, is_default FROM roles WHERE is_default=1",
            [],
            map_role,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("default role (roles not seeded?)"))
    }

    pub fn list_roles(&self) -> CoreResult<Vec<Role>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, permissions, is_default FROM roles ORDER BY id")?;
        let rows = stmt
            .query_map([], map_role)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn add_role_permission(&self, name: &str, perm: Permission) -> CoreResult<Role> {
        self.update_role_bits(name, |bits| permissions::add_permission(bits, perm))
    }

    pub fn remove_role_permission(&self, name: &str, perm: Permission) -> CoreResult<Role> {
        self.update_role_bits(name, |bits| permissions::remove_permission(bits, perm))
    }

    pub fn reset_role_permissions(&self, name: &str) -> CoreResult<Role> {
        self.update_role_bits(name, |_| permissions::reset_permissions())
    }

    fn update_role_bits(&self, name: &str, f: impl FnOnce(u32) -> u32) -> CoreResult<Role> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut role = tx
            .query_row(
                "SELECT id, name, permissions, is_default FROM roles WHERE name=?1",
                params![name],
                map_role,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found(format!("role {name:?}")))?;
        role.permissions = f(role.permissions);
        tx.execute(
            "UPDATE roles SET permissions=?1 WHERE id=?2",
            params![role.permissions, role.id],
        )?;
        tx.commit()?;
        Ok(role)
    }

    // ── Identities ──────────────────────────────────────────────────────

    /// Inserts an identity together with its mandatory self-follow edge, in
    /// one transaction. The caller resolves the role first (see
    /// `accounts::AccountService::register`). Duplicate username or email is
    /// a `Conflict`.
    pub fn create_identity(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role_id: i64,
    ) -> CoreResult<Identity> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(CoreError::validation("username must not be empty"));
        }
        if email.is_empty() {
            return Err(CoreError::validation("email must not be empty"));
        }

        let now = now_ms();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO identities(username, email, password_hash, confirmed, role_id,
                                   avatar_hash, created_at_ms, last_seen_ms)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)
            "#,
            params![username, email, password_hash, role_id, avatar_hash_for(email), now],
        )?;
        let id = tx.last_insert_rowid();
        // Everyone sees their own posts in their own feed.
        tx.execute(
            "INSERT INTO follows(follower_id, followed_id, created_at_ms) VALUES (?1, ?1, ?2)",
            params![id, now],
        )?;
        tx.commit()?;

        self.identity_by_id(id)?
            .ok_or_else(|| CoreError::Internal("identity vanished after insert".to_string()))
    }

    pub fn identity_by_id(&self, id: i64) -> CoreResult<Option<Identity>> {
        self.identity_where("i.id=?1", params![id])
    }

    pub fn identity_by_username(&self, username: &str) -> CoreResult<Option<Identity>> {
        self.identity_where("i.username=?1", params![username])
    }

    pub fn identity_by_email(&self, email: &str) -> CoreResult<Option<Identity>> {
        self.identity_where("i.email=?1", params![email])
    }

    fn identity_where(
        &self,
        cond: &str,
        args: impl rusqlite::Params,
    ) -> CoreResult<Option<Identity>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT i.id, i.username, i.email, i.password_hash, i.confirmed,
                   i.role_id, r.name, r.permissions,
                   i.display_name, i.location, i.about_me, i.avatar_hash,
                   i.created_at_ms, i.last_seen_ms
            FROM identities i JOIN roles r ON r.id = i.role_id
            WHERE {cond}
            "#
        );
        conn.query_row(&sql, args, map_identity)
            .optional()
            .map_err(Into::into)
    }

    /// Flips `confirmed` on. There is no way back to unconfirmed.
    pub fn confirm_identity(&self, id: i64) -> CoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute("UPDATE identities SET confirmed=1 WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(CoreError::not_found(format!("identity #{id}")));
        }
        Ok(())
    }

    pub fn touch_last_seen(&self, id: i64) -> CoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE identities SET last_seen_ms=?1 WHERE id=?2",
            params![now_ms(), id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("identity #{id}")));
        }
        Ok(())
    }

    pub fn set_password_hash(&self, id: i64, password_hash: &str) -> CoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE identities SET password_hash=?1 WHERE id=?2",
            params![password_hash, id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("identity #{id}")));
        }
        Ok(())
    }

    pub fn update_profile(
        &self,
        id: i64,
        display_name: Option<&str>,
        location: Option<&str>,
        about_me: Option<&str>,
    ) -> CoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE identities SET display_name=?1, location=?2, about_me=?3 WHERE id=?4",
            params![display_name, location, about_me, id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("identity #{id}")));
        }
        Ok(())
    }

    /// Changes the address and recomputes the avatar hash. Duplicate email is
    /// a `Conflict`.
    pub fn set_email(&self, id: i64, new_email: &str) -> CoreResult<()> {
        let new_email = new_email.trim();
        if new_email.is_empty() {
            return Err(CoreError::validation("email must not be empty"));
        }
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE identities SET email=?1, avatar_hash=?2 WHERE id=?3",
            params![new_email, avatar_hash_for(new_email), id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("identity #{id}")));
        }
        Ok(())
    }

    pub fn email_taken_by_other(&self, email: &str, id: i64) -> CoreResult<bool> {
        let conn = self.conn()?;
        let taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM identities WHERE email=?1 AND id<>?2",
                params![email.trim(), id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(taken.is_some())
    }

    fn identity_exists(&self, conn: &Connection, id: i64) -> CoreResult<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM identities WHERE id=?1", params![id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    // ── Follow graph ────────────────────────────────────────────────────

    /// Inserts the edge if absent. Following an already-followed identity is
    /// a no-op; following a missing one is `NotFound`.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> CoreResult<()> {
        let conn = self.conn()?;
        if !self.identity_exists(&conn, follower_id)? {
            return Err(CoreError::not_found(format!("identity #{follower_id}")));
        }
        if !self.identity_exists(&conn, followed_id)? {
            return Err(CoreError::not_found(format!("identity #{followed_id}")));
        }
        conn.execute(
            "INSERT OR IGNORE INTO follows(follower_id, followed_id, created_at_ms) VALUES (?1, ?2, ?3)",
            params![follower_id, followed_id, now_ms()],
        )?;
        Ok(())
    }

    /// Removes the edge if present; silent no-op otherwise. The self-edge is
    /// an ordinary edge here and removing it succeeds.
    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> CoreResult<()> {
        let conn = self.conn()?;
        let _ = conn.execute(
            "DELETE FROM follows WHERE follower_id=?1 AND followed_id=?2",
            params![follower_id, followed_id],
        )?;
        Ok(())
    }

    pub fn is_following(&self, follower_id: i64, followed_id: i64) -> CoreResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM follows WHERE follower_id=?1 AND followed_id=?2",
                params![follower_id, followed_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn is_followed_by(&self, followed_id: i64, follower_id: i64) -> CoreResult<bool> {
        self.is_following(follower_id, followed_id)
    }

    /// Identities that `id` follows, oldest edge first.
    pub fn following_of(&self, id: i64, limit: u32, offset: u32) -> CoreResult<Vec<FollowEntry>> {
        self.follow_entries(
            r#"
            SELECT f.followed_id, i.username, f.created_at_ms
            FROM follows f JOIN identities i ON i.id = f.followed_id
            WHERE f.follower_id=?1
            ORDER BY f.created_at_ms, f.rowid
            LIMIT ?2 OFFSET ?3
            "#,
            id,
            limit,
            offset,
        )
    }

    /// Identities following `id`, oldest edge first.
    pub fn followers_of(&self, id: i64, limit: u32, offset: u32) -> CoreResult<Vec<FollowEntry>> {
        self.follow_entries(
            r#"
            SELECT f.follower_id, i.username, f.created_at_ms
            FROM follows f JOIN identities i ON i.id = f.follower_id
            WHERE f.followed_id=?1
            ORDER BY f.created_at_ms, f.rowid
            LIMIT ?2 OFFSET ?3
            "#,
            id,
            limit,
            offset,
        )
    }

    fn follow_entries(
        &self,
        sql: &str,
        id: i64,
        limit: u32,
        offset: u32,
    ) -> CoreResult<Vec<FollowEntry>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 10_000) as i64;
        let offset = offset.min(100_000) as i64;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![id, limit, offset], |r| {
                Ok(FollowEntry {
                    identity_id: r.get(0)?,
                    username: r.get(1)?,
                    since_ms: r.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_following(&self, id: i64) -> CoreResult<u64> {
        let conn = self.conn()?;
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id=?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn count_followers(&self, id: i64) -> CoreResult<u64> {
        let conn = self.conn()?;
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE followed_id=?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    // ── Posts ───────────────────────────────────────────────────────────

    /// Writes always go through rendering; there is no path that stores a
    /// body without its derived markup.
    pub fn create_post(&self, author_id: i64, body: &str) -> CoreResult<Post> {
        if body.trim().is_empty() {
            return Err(CoreError::validation("post body must not be empty"));
        }
        let rendered = render::render_post(body);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts(author_id, body, body_rendered, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![author_id, body, rendered, now_ms()],
        )?;
        let id = conn.last_insert_rowid();
        self.post_by_id(id)?
            .ok_or_else(|| CoreError::Internal("post vanished after insert".to_string()))
    }

    pub fn post_by_id(&self, id: i64) -> CoreResult<Option<Post>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, author_id, body, body_rendered, created_at_ms FROM posts WHERE id=?1",
            params![id],
            map_post,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn set_post_body(&self, id: i64, body: &str) -> CoreResult<Post> {
        if body.trim().is_empty() {
            return Err(CoreError::validation("post body must not be empty"));
        }
        let rendered = render::render_post(body);
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE posts SET body=?1, body_rendered=?2 WHERE id=?3",
            params![body, rendered, id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("post #{id}")));
        }
        self.post_by_id(id)?
            .ok_or_else(|| CoreError::Internal("post vanished after update".to_string()))
    }

    pub fn recent_posts(&self, limit: u32, offset: u32) -> CoreResult<Vec<Post>> {
        self.posts_where(
            "SELECT id, author_id, body, body_rendered, created_at_ms FROM posts
             ORDER BY created_at_ms DESC, id DESC LIMIT ?1 OFFSET ?2",
            None,
            limit,
            offset,
        )
    }

    pub fn posts_by_author(&self, author_id: i64, limit: u32, offset: u32) -> CoreResult<Vec<Post>> {
        self.posts_where(
            "SELECT id, author_id, body, body_rendered, created_at_ms FROM posts
             WHERE author_id=?3 ORDER BY created_at_ms DESC, id DESC LIMIT ?1 OFFSET ?2",
            Some(author_id),
            limit,
            offset,
        )
    }

    /// The feed: posts authored by anyone `id` follows. The self-edge makes
    /// one's own posts show up without special-casing.
    pub fn followed_posts(&self, id: i64, limit: u32, offset: u32) -> CoreResult<Vec<Post>> {
        self.posts_where(
            "SELECT p.id, p.author_id, p.body, p.body_rendered, p.created_at_ms
             FROM posts p JOIN follows f ON f.followed_id = p.author_id
             WHERE f.follower_id=?3
             ORDER BY p.created_at_ms DESC, p.id DESC LIMIT ?1 OFFSET ?2",
            Some(id),
            limit,
            offset,
        )
    }

    fn posts_where(
        &self,
        sql: &str,
        scope: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> CoreResult<Vec<Post>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 10_000) as i64;
        let offset = offset.min(100_000) as i64;
        let mut stmt = conn.prepare(sql)?;
        let rows = match scope {
            Some(id) => stmt
                .query_map(params![limit, offset, id], map_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map(params![limit, offset], map_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    pub fn count_posts(&self) -> CoreResult<u64> {
        let conn = self.conn()?;
        let n: u64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
        Ok(n)
    }

    // ── Comments ────────────────────────────────────────────────────────

    pub fn create_comment(&self, author_id: i64, post_id: i64, body: &str) -> CoreResult<Comment> {
        if body.trim().is_empty() {
            return Err(CoreError::validation("comment body must not be empty"));
        }
        let rendered = render::render_comment(body);
        let conn = self.conn()?;
        if self.post_by_id(post_id)?.is_none() {
            return Err(CoreError::not_found(format!("post #{post_id}")));
        }
        conn.execute(
            "INSERT INTO comments(post_id, author_id, body, body_rendered, disabled, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![post_id, author_id, body, rendered, now_ms()],
        )?;
        let id = conn.last_insert_rowid();
        self.comment_by_id(id)?
            .ok_or_else(|| CoreError::Internal("comment vanished after insert".to_string()))
    }

    pub fn comment_by_id(&self, id: i64) -> CoreResult<Option<Comment>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, post_id, author_id, body, body_rendered, disabled, created_at_ms
             FROM comments WHERE id=?1",
            params![id],
            map_comment,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn set_comment_body(&self, id: i64, body: &str) -> CoreResult<Comment> {
        if body.trim().is_empty() {
            return Err(CoreError::validation("comment body must not be empty"));
        }
        let rendered = render::render_comment(body);
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE comments SET body=?1, body_rendered=?2 WHERE id=?3",
            params![body, rendered, id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("comment #{id}")));
        }
        self.comment_by_id(id)?
            .ok_or_else(|| CoreError::Internal("comment vanished after update".to_string()))
    }

    /// Moderation toggle. Touches nothing but the `disabled` flag; the
    /// permission check lives in `content::ContentService::moderate_comment`.
    pub fn set_comment_disabled(&self, id: i64, disabled: bool) -> CoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE comments SET disabled=?1 WHERE id=?2",
            params![disabled as i64, id],
        )?;
        if n == 0 {
            return Err(CoreError::not_found(format!("comment #{id}")));
        }
        Ok(())
    }

    /// Comments of a post in insertion order, including disabled ones;
    /// display layers decide what a moderator sees versus everyone else.
    pub fn comments_of_post(&self, post_id: i64, limit: u32, offset: u32) -> CoreResult<Vec<Comment>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 10_000) as i64;
        let offset = offset.min(100_000) as i64;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, author_id, body, body_rendered, disabled, created_at_ms
             FROM comments WHERE post_id=?1
             ORDER BY created_at_ms, id LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![post_id, limit, offset], map_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn disabled_comments(&self, limit: u32, offset: u32) -> CoreResult<Vec<Comment>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 10_000) as i64;
        let offset = offset.min(100_000) as i64;
        let mut stmt = conn.prepare(
            "SELECT id, post_id, author_id, body, body_rendered, disabled, created_at_ms
             FROM comments WHERE disabled=1
             ORDER BY created_at_ms, id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit, offset], map_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_role(r: &rusqlite::Row<'_>) -> rusqlite::Result<Role> {
    let is_default: i64 = r.get(3)?;
    Ok(Role {
        id: r.get(0)?,
        name: r.get(1)?,
        permissions: r.get(2)?,
        is_default: is_default != 0,
    })
}

fn map_identity(r: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    let confirmed: i64 = r.get(4)?;
    Ok(Identity {
        id: r.get(0)?,
        username: r.get(1)?,
        email: r.get(2)?,
        password_hash: r.get(3)?,
        confirmed: confirmed != 0,
        role_id: r.get(5)?,
        role_name: r.get(6)?,
        role_permissions: r.get(7)?,
        display_name: r.get(8)?,
        location: r.get(9)?,
        about_me: r.get(10)?,
        avatar_hash: r.get(11)?,
        created_at_ms: r.get(12)?,
        last_seen_ms: r.get(13)?,
    })
}

fn map_post(r: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: r.get(0)?,
        author_id: r.get(1)?,
        body: r.get(2)?,
        body_rendered: r.get(3)?,
        created_at_ms: r.get(4)?,
    })
}

fn map_comment(r: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let disabled: i64 = r.get(5)?;
    Ok(Comment {
        id: r.get(0)?,
        post_id: r.get(1)?,
        author_id: r.get(2)?,
        body: r.get(3)?,
        body_rendered: r.get(4)?,
        disabled: disabled != 0,
        created_at_ms: r.get(6)?,
    })
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
