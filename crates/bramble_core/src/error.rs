/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::tokens::TokenError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Per-operation outcomes of the domain core. Nothing here is fatal to the
/// process; callers decide what to surface and what to absorb.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: requires {0}")]
    PermissionDenied(&'static str),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Db(rusqlite::Error),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}

/// Constraint violations out of SQLite are recoverable conflicts, not crashes:
/// uniqueness races map to `Conflict`, dangling references to `NotFound`.
impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(f, msg) = &e {
            if f.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = msg.clone().unwrap_or_else(|| "constraint violation".to_string());
                if detail.contains("FOREIGN KEY") {
                    return CoreError::NotFound("referenced row does not exist".to_string());
                }
                return CoreError::Conflict(detail);
            }
        }
        CoreError::Db(e)
    }
}
