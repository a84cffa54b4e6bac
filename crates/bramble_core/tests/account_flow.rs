/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! End-to-end flows over a real on-disk database: registration with role
//! resolution, the confirmation protocol, email changes and permission
//! gating.

use std::sync::{Arc, Mutex};

use bramble_core::accounts::{AccountService, NewAccount};
use bramble_core::content::ContentService;
use bramble_core::mailer::Mailer;
use bramble_core::tokens::{TokenError, TokenService};
use bramble_core::{CommunityDb, CoreError, Permission};

const SECRET: &[u8] = b"integration-test-secret-0123456789";
const ADMIN_EMAIL: &str = "admin@example.com";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    fn last_token(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, _, body) = sent.last().expect("no mail recorded");
        body.split_whitespace().last().unwrap().to_string()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, recipient: &str, subject: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string(), body.to_string()));
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    db: CommunityDb,
    accounts: AccountService,
    content: ContentService,
    mailer: Arc<RecordingMailer>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = CommunityDb::open(dir.path().join("community.sqlite")).unwrap();
    db.seed_default_roles().unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let accounts = AccountService::new(
        db.clone(),
        TokenService::new(SECRET),
        mailer.clone(),
        Some(ADMIN_EMAIL.to_string()),
        TokenService::DEFAULT_TTL_SECS,
    );
    let content = ContentService::new(db.clone());
    Harness {
        _dir: dir,
        db,
        accounts,
        content,
        mailer,
    }
}

fn register(h: &Harness, username: &str, email: &str) -> bramble_core::community_db::Identity {
    h.accounts
        .register(NewAccount {
            username,
            email,
            password: "horse battery staple",
            role: None,
        })
        .unwrap()
}

#[test]
fn admin_email_binds_the_administrator_role() {
    let h = harness();
    let root = register(&h, "root", ADMIN_EMAIL);
    assert_eq!(root.role_name, "Administrator");
    assert_eq!(root.role_permissions, 31);
    assert!(root.is_administrator());

    let bob = register(&h, "bob", "bob@example.com");
    assert_eq!(bob.role_name, "User");
    assert!(!bob.can(Permission::Admin));
}

#[test]
fn explicit_role_overrides_everything() {
    let h = harness();
    let mod_account = h
        .accounts
        .register(NewAccount {
            username: "mira",
            email: ADMIN_EMAIL,
            password: "pw",
            role: Some("Moderator"),
        })
        .unwrap();
    assert_eq!(mod_account.role_name, "Moderator");
}

#[test]
fn registration_confirmation_round_trip() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    assert!(!alice.confirmed);
    assert!(h.db.is_following(alice.id, alice.id).unwrap());

    // The token travels through the mail boundary.
    let token = h.mailer.last_token();
    let confirmed = h.accounts.confirm(&token).unwrap();
    assert_eq!(confirmed.id, alice.id);
    assert!(confirmed.confirmed);

    // Confirming again is a no-op, not an error.
    assert!(h.accounts.confirm(&token).unwrap().confirmed);
}

#[test]
fn expired_confirmation_token_fails() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");

    let stale = AccountService::new(
        h.db.clone(),
        TokenService::new(SECRET),
        h.mailer.clone(),
        None,
        -10, // already past its TTL when issued
    );
    let token = stale.issue_confirmation_token(&alice).unwrap();
    assert!(matches!(
        h.accounts.confirm(&token),
        Err(CoreError::Token(TokenError::Expired))
    ));
    assert!(!h.db.identity_by_id(alice.id).unwrap().unwrap().confirmed);
}

#[test]
fn tokens_are_single_purpose() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    let change = h
        .accounts
        .request_email_change(alice.id, "fresh@example.com")
        .unwrap();
    assert!(matches!(
        h.accounts.confirm(&change),
        Err(CoreError::Token(TokenError::WrongPurpose))
    ));
}

#[test]
fn resend_is_skipped_once_confirmed() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    assert!(h.accounts.resend_confirmation(alice.id).unwrap());
    let token = h.mailer.last_token();
    h.accounts.confirm(&token).unwrap();
    assert!(!h.accounts.resend_confirmation(alice.id).unwrap());
}

#[test]
fn email_change_applies_and_mails_the_new_address() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    let token = h
        .accounts
        .request_email_change(alice.id, "fresh@example.com")
        .unwrap();
    {
        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap().0, "fresh@example.com");
    }
    let updated = h.accounts.confirm_email_change(&token).unwrap();
    assert_eq!(updated.email, "fresh@example.com");
}

#[test]
fn email_change_fails_when_address_claimed_after_issue() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    let token = h
        .accounts
        .request_email_change(alice.id, "carol@example.com")
        .unwrap();
    register(&h, "carol", "carol@example.com");
    assert!(matches!(
        h.accounts.confirm_email_change(&token),
        Err(CoreError::Token(TokenError::EmailTaken))
    ));
}

#[test]
fn duplicate_registration_surfaces_conflict() {
    let h = harness();
    register(&h, "alice", "alice@example.com");
    let err = h
        .accounts
        .register(NewAccount {
            username: "alice",
            email: "other@example.com",
            password: "pw",
            role: None,
        })
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[test]
fn authenticate_checks_password_and_bumps_last_seen() {
    let h = harness();
    let alice = register(&h, "alice", "alice@example.com");
    assert!(h
        .accounts
        .authenticate("alice@example.com", "wrong")
        .unwrap()
        .is_none());
    assert!(h
        .accounts
        .authenticate("nobody@example.com", "horse battery staple")
        .unwrap()
        .is_none());

    std::thread::sleep(std::time::Duration::from_millis(5));
    let logged_in = h
        .accounts
        .authenticate("alice@example.com", "horse battery staple")
        .unwrap()
        .unwrap();
    assert_eq!(logged_in.id, alice.id);
    assert!(logged_in.last_seen_ms >= alice.last_seen_ms);
}

#[test]
fn moderation_is_gated_by_the_moderate_bit() {
    let h = harness();
    let bob = register(&h, "bob", "bob@example.com");
    let post = h.content.create_post(&bob, "a post http://example.com").unwrap();
    assert!(post.body_rendered.contains("<a href=\"http://example.com\""));
    let comment = h.content.create_comment(&bob, post.id, "rude remark").unwrap();

    assert!(matches!(
        h.content.moderate_comment(&bob, comment.id, true),
        Err(CoreError::PermissionDenied(_))
    ));

    let mira = h
        .accounts
        .register(NewAccount {
            username: "mira",
            email: "mira@example.com",
            password: "pw",
            role: Some("Moderator"),
        })
        .unwrap();
    h.content.moderate_comment(&mira, comment.id, true).unwrap();
    let hidden = h.db.comment_by_id(comment.id).unwrap().unwrap();
    assert!(hidden.disabled);
    assert_eq!(hidden.body, "rude remark");
}

#[test]
fn post_editing_requires_authorship_or_admin() {
    let h = harness();
    let bob = register(&h, "bob", "bob@example.com");
    let carol = register(&h, "carol", "carol@example.com");
    let root = register(&h, "root", ADMIN_EMAIL);

    let post = h.content.create_post(&bob, "original").unwrap();
    assert!(matches!(
        h.content.edit_post(&carol, post.id, "hijacked"),
        Err(CoreError::PermissionDenied(_))
    ));
    let edited = h.content.edit_post(&bob, post.id, "by author").unwrap();
    assert!(edited.body_rendered.contains("by author"));
    let edited = h.content.edit_post(&root, post.id, "by admin").unwrap();
    assert!(edited.body_rendered.contains("by admin"));
}

#[test]
fn follow_entry_points_require_the_follow_bit() {
    let h = harness();
    let bob = register(&h, "bob", "bob@example.com");
    let carol = register(&h, "carol", "carol@example.com");

    h.content.follow(&bob, carol.id).unwrap();
    assert!(h.db.is_following(bob.id, carol.id).unwrap());
    h.content.unfollow(&bob, carol.id).unwrap();
    assert!(!h.db.is_following(bob.id, carol.id).unwrap());

    let stripped = h.db.reset_role_permissions("User").unwrap();
    assert_eq!(stripped.permissions, 0);
    let bob = h.db.identity_by_id(bob.id).unwrap().unwrap();
    assert!(matches!(
        h.content.follow(&bob, carol.id),
        Err(CoreError::PermissionDenied(_))
    ));
}
