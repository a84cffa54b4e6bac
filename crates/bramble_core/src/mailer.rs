/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Mail dispatch boundary. The core hands over `(recipient, subject, body)`
//! and moves on: delivery, retries and templating live outside, and a failed
//! dispatch never rolls back the domain mutation that triggered it.

use tracing::info;

pub trait Mailer: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str);
}

/// Logs outgoing mail instead of delivering it. Useful for development and
/// as the default wiring before a real transport is plugged in.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, recipient: &str, subject: &str, _body: &str) {
        info!(to = recipient, subject = subject, "mail dispatched");
    }
}
