/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Dev utility: open (or create) the community database, seed the built-in
//! roles and optionally a pair of demo accounts.

use std::sync::Arc;

use anyhow::Result;
use bramble_core::accounts::{AccountService, NewAccount};
use bramble_core::config::CoreConfig;
use bramble_core::mailer::LogMailer;
use bramble_core::tokens::TokenService;
use bramble_core::CommunityDb;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = CoreConfig::from_env()?;
    if let Some(dir) = cfg.database_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let db = CommunityDb::open(&cfg.database_path)?;
    db.seed_default_roles()?;
    for role in db.list_roles()? {
        println!(
            "role {:<13} bits={:#07b} default={}",
            role.name, role.permissions, role.is_default
        );
    }

    if std::env::var("BRAMBLE_DEMO").is_ok() {
        let accounts = AccountService::new(
            db.clone(),
            TokenService::new(cfg.secret_key.as_bytes()),
            Arc::new(LogMailer),
            cfg.admin_email.clone(),
            cfg.token_ttl_secs,
        );
        for (username, email) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
            match accounts.register(NewAccount {
                username,
                email,
                password: "changeme",
                role: None,
            }) {
                Ok(identity) => println!("registered {} as {}", identity.username, identity.role_name),
                Err(e) => println!("skipping {username}: {e}"),
            }
        }
    }

    println!("database ready at {}", cfg.database_path.display());
    Ok(())
}
