/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Process-wide configuration, resolved once at startup from `BRAMBLE_*`
//! environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use rand::{rngs::OsRng, RngCore};
use tracing::warn;

#[derive(Clone)]
pub struct CoreConfig {
    pub database_path: PathBuf,
    /// Signing secret for confirmation tokens. Tokens issued under one
    /// secret are not valid under another.
    pub secret_key: String,
    /// Registrations with this address are bound to the Administrator role.
    pub admin_email: Option<String>,
    pub token_ttl_secs: i64,
}

pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(v) = std::env::var("BRAMBLE_DATA_DIR") {
        return Ok(PathBuf::from(v));
    }
    let proj = ProjectDirs::from("net", "bramble", "Bramble")
        .context("unable to determine platform data dir")?;
    Ok(proj.data_local_dir().to_path_buf())
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let database_path = match std::env::var("BRAMBLE_DATABASE") {
            Ok(v) => PathBuf::from(v),
            Err(_) => default_data_dir()?.join("community.sqlite"),
        };

        let secret_key = match std::env::var("BRAMBLE_SECRET_KEY") {
            Ok(v) if v.len() >= 32 => v,
            Ok(_) => anyhow::bail!("BRAMBLE_SECRET_KEY must be at least 32 characters"),
            Err(_) => {
                warn!("BRAMBLE_SECRET_KEY not set; generating an ephemeral secret. Tokens will not survive a restart.");
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
        };

        let admin_email = std::env::var("BRAMBLE_ADMIN").ok().filter(|v| !v.trim().is_empty());

        let token_ttl_secs = std::env::var("BRAMBLE_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::tokens::TokenService::DEFAULT_TTL_SECS);

        Ok(Self {
            database_path,
            secret_key,
            admin_email,
            token_ttl_secs,
        })
    }
}
