/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod accounts;
pub mod community_db;
pub mod config;
pub mod content;
pub mod error;
pub mod mailer;
pub mod password;
pub mod permissions;
pub mod render;
pub mod tokens;

pub use community_db::CommunityDb;
pub use error::{CoreError, CoreResult};
pub use permissions::Permission;
