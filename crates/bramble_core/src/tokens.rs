/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Signed, time-limited confirmation tokens (HS256).
//!
//! A token binds one identity to one pending action. Tokens signed under a
//! different secret, expired tokens, and tokens presented for the wrong
//! purpose all fail verification as values, never as panics.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("token purpose mismatch")]
    WrongPurpose,

    #[error("token subject no longer exists")]
    UnknownIdentity,

    #[error("requested email is already taken")]
    EmailTaken,

    #[error("token generation failed: {0}")]
    Generation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    ConfirmAccount,
    ChangeEmail,
}

impl TokenPurpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::ConfirmAccount => "confirm",
            TokenPurpose::ChangeEmail => "change_email",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    purpose: String,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_email: Option<String>,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub identity_id: i64,
    pub new_email: Option<String>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub const DEFAULT_TTL_SECS: i64 = 3600;

    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(
        &self,
        identity_id: i64,
        purpose: TokenPurpose,
        ttl_secs: i64,
    ) -> Result<String, TokenError> {
        self.issue_claims(identity_id, purpose, ttl_secs, None)
    }

    /// Email-change tokens carry the pending address as payload.
    pub fn issue_email_change(
        &self,
        identity_id: i64,
        new_email: &str,
        ttl_secs: i64,
    ) -> Result<String, TokenError> {
        self.issue_claims(
            identity_id,
            TokenPurpose::ChangeEmail,
            ttl_secs,
            Some(new_email.to_string()),
        )
    }

    fn issue_claims(
        &self,
        identity_id: i64,
        purpose: TokenPurpose,
        ttl_secs: i64,
        new_email: Option<String>,
    ) -> Result<String, TokenError> {
        let now = now_secs();
        let claims = Claims {
            sub: identity_id.to_string(),
            purpose: purpose.as_str().to_string(),
            iat: now,
            exp: now + ttl_secs,
            new_email,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::Invalid("bad signature".to_string()),
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if data.claims.purpose != purpose.as_str() {
            return Err(TokenError::WrongPurpose);
        }
        let identity_id: i64 = data
            .claims
            .sub
            .parse()
            .map_err(|_| TokenError::Invalid("malformed subject".to_string()))?;

        Ok(VerifiedToken {
            identity_id,
            new_email: data.claims.new_email,
        })
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
