/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Account lifecycle: registration, confirmation, email changes, login.
//!
//! This is the layer that ties the store, the token service and the mail
//! boundary together. Mail is dispatched after the domain mutation has
//! committed and its outcome is ignored here.

use std::sync::Arc;

use tracing::info;

use crate::community_db::{CommunityDb, Identity};
use crate::error::{CoreError, CoreResult};
use crate::mailer::Mailer;
use crate::password;
use crate::tokens::{TokenError, TokenPurpose, TokenService};

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    /// Explicit role name; overrides both the administrator-email match and
    /// the default role.
    pub role: Option<&'a str>,
}

#[derive(Clone)]
pub struct AccountService {
    db: CommunityDb,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
    token_ttl_secs: i64,
}

impl AccountService {
    pub fn new(
        db: CommunityDb,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        admin_email: Option<String>,
        token_ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            admin_email,
            token_ttl_secs,
        }
    }

    /// Creates an unconfirmed identity and dispatches the confirmation mail.
    /// Role resolution happens before the identity (and its self-follow
    /// edge) is written: explicit role, then administrator-email match,
    /// then the default role.
    pub fn register(&self, account: NewAccount<'_>) -> CoreResult<Identity> {
        if account.password.is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }
        let role = match account.role {
            Some(name) => self.db.role_by_name(name)?,
            None if self.is_admin_email(account.email) => self.db.role_by_name("Administrator")?,
            None => self.db.default_role()?,
        };

        let hash = password::hash_password(account.password)?;
        let identity = self
            .db
            .create_identity(account.username, account.email, &hash, role.id)?;
        info!(username = %identity.username, role = %identity.role_name, "identity registered");

        let token = self.issue_confirmation_token(&identity)?;
        self.mailer.send(
            &identity.email,
            "[bramble] Confirm your account",
            &confirmation_mail_body(&identity.username, &token),
        );
        Ok(identity)
    }

    fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }

    pub fn issue_confirmation_token(&self, identity: &Identity) -> CoreResult<String> {
        Ok(self
            .tokens
            .issue(identity.id, TokenPurpose::ConfirmAccount, self.token_ttl_secs)?)
    }

    /// Unconfirmed → Confirmed, through a verified token only. Confirming an
    /// already-confirmed identity is a no-op.
    pub fn confirm(&self, token: &str) -> CoreResult<Identity> {
        let verified = self.tokens.verify(token, TokenPurpose::ConfirmAccount)?;
        let identity = self
            .db
            .identity_by_id(verified.identity_id)?
            .ok_or(CoreError::Token(TokenError::UnknownIdentity))?;
        if identity.confirmed {
            return Ok(identity);
        }
        self.db.confirm_identity(identity.id)?;
        info!(username = %identity.username, "account confirmed");
        self.db
            .identity_by_id(identity.id)?
            .ok_or(CoreError::Token(TokenError::UnknownIdentity))
    }

    /// Re-sends the confirmation mail. Returns false (and sends nothing)
    /// when the account is already confirmed.
    pub fn resend_confirmation(&self, identity_id: i64) -> CoreResult<bool> {
        let identity = self
            .db
            .identity_by_id(identity_id)?
            .ok_or_else(|| CoreError::not_found(format!("identity #{identity_id}")))?;
        if identity.confirmed {
            return Ok(false);
        }
        let token = self.issue_confirmation_token(&identity)?;
        self.mailer.send(
            &identity.email,
            "[bramble] Confirm your account",
            &confirmation_mail_body(&identity.username, &token),
        );
        Ok(true)
    }

    /// Issues an email-change token bound to the pending address and mails
    /// it to that address. The address is checked here and re-checked at
    /// verification time.
    pub fn request_email_change(&self, identity_id: i64, new_email: &str) -> CoreResult<String> {
        let new_email = new_email.trim();
        if new_email.is_empty() {
            return Err(CoreError::validation("email must not be empty"));
        }
        let identity = self
            .db
            .identity_by_id(identity_id)?
            .ok_or_else(|| CoreError::not_found(format!("identity #{identity_id}")))?;
        if self.db.email_taken_by_other(new_email, identity.id)? {
            return Err(CoreError::Conflict(format!("email {new_email:?} is already taken")));
        }

        let token = self
            .tokens
            .issue_email_change(identity.id, new_email, self.token_ttl_secs)?;
        self.mailer.send(
            new_email,
            "[bramble] Confirm your new email address",
            &email_change_mail_body(&identity.username, &token),
        );
        Ok(token)
    }

    /// Applies a verified email change. Fails with `TokenError::EmailTaken`
    /// when the pending address was claimed by someone else after the token
    /// was issued, even though the signature is valid.
    pub fn confirm_email_change(&self, token: &str) -> CoreResult<Identity> {
        let verified = self.tokens.verify(token, TokenPurpose::ChangeEmail)?;
        let new_email = verified
            .new_email
            .ok_or_else(|| CoreError::Token(TokenError::Invalid("missing pending address".to_string())))?;
        let identity = self
            .db
            .identity_by_id(verified.identity_id)?
            .ok_or(CoreError::Token(TokenError::UnknownIdentity))?;
        if self.db.email_taken_by_other(&new_email, identity.id)? {
            return Err(CoreError::Token(TokenError::EmailTaken));
        }
        self.db.set_email(identity.id, &new_email)?;
        info!(username = %identity.username, "email address changed");
        self.db
            .identity_by_id(identity.id)?
            .ok_or(CoreError::Token(TokenError::UnknownIdentity))
    }

    /// Login check. Returns None for both unknown address and wrong
    /// password, so callers cannot distinguish the two. Bumps last-seen on
    /// success.
    pub fn authenticate(&self, email: &str, plaintext: &str) -> CoreResult<Option<Identity>> {
        let Some(identity) = self.db.identity_by_email(email.trim())? else {
            return Ok(None);
        };
        if !password::verify_password(plaintext, &identity.password_hash) {
            return Ok(None);
        }
        self.db.touch_last_seen(identity.id)?;
        self.db.identity_by_id(identity.id)
    }

    pub fn set_password(&self, identity_id: i64, new_password: &str) -> CoreResult<()> {
        if new_password.is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }
        let hash = password::hash_password(new_password)?;
        self.db.set_password_hash(identity_id, &hash)
    }
}

fn confirmation_mail_body(username: &str, token: &str) -> String {
    format!(
        "Hello {username},\n\nconfirm your account within the next hour using this token:\n\n{token}"
    )
}

fn email_change_mail_body(username: &str, token: &str) -> String {
    format!(
        "Hello {username},\n\nconfirm your new email address within the next hour using this token:\n\n{token}"
    )
}
