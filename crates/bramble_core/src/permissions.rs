/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Capability flags and the role templates built from them.
//!
//! Bit values are frozen once introduced: stored role rows depend on them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Permission {
    /// Follow other identities.
    Follow = 0x01,
    /// Comment on posts.
    Comment = 0x02,
    /// Write posts.
    Write = 0x04,
    /// Toggle comment visibility.
    Moderate = 0x08,
    /// Administrative access.
    Admin = 0x10,
}

impl Permission {
    pub const fn bit(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Permission::Follow => "FOLLOW",
            Permission::Comment => "COMMENT",
            Permission::Write => "WRITE",
            Permission::Moderate => "MODERATE",
            Permission::Admin => "ADMIN",
        }
    }
}

pub fn has_permission(bits: u32, perm: Permission) -> bool {
    bits & perm.bit() == perm.bit()
}

pub fn add_permission(bits: u32, perm: Permission) -> u32 {
    bits | perm.bit()
}

pub fn remove_permission(bits: u32, perm: Permission) -> u32 {
    bits & !perm.bit()
}

pub fn reset_permissions() -> u32 {
    0
}

/// A seedable role definition.
pub struct RoleTemplate {
    pub name: &'static str,
    pub permissions: u32,
    pub is_default: bool,
}

const USER_BITS: u32 =
    Permission::Follow.bit() | Permission::Comment.bit() | Permission::Write.bit();
const MODERATOR_BITS: u32 = USER_BITS | Permission::Moderate.bit();
const ADMINISTRATOR_BITS: u32 = MODERATOR_BITS | Permission::Admin.bit();

/// The three built-in roles. Exactly one is the default for new identities.
pub const DEFAULT_ROLES: &[RoleTemplate] = &[
    RoleTemplate {
        name: "User",
        permissions: USER_BITS,
        is_default: true,
    },
    RoleTemplate {
        name: "Moderator",
        permissions: MODERATOR_BITS,
        is_default: false,
    },
    RoleTemplate {
        name: "Administrator",
        permissions: ADMINISTRATOR_BITS,
        is_default: false,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_check() {
        let bits = add_permission(0, Permission::Moderate);
        assert!(has_permission(bits, Permission::Moderate));
        assert!(!has_permission(bits, Permission::Admin));
    }

    #[test]
    fn add_remove_round_trips() {
        let original = USER_BITS;
        let added = add_permission(original, Permission::Moderate);
        assert_eq!(remove_permission(added, Permission::Moderate), original);
    }

    #[test]
    fn add_is_idempotent() {
        let once = add_permission(USER_BITS, Permission::Write);
        assert_eq!(add_permission(once, Permission::Write), once);
    }

    #[test]
    fn reset_clears_everything() {
        let bits = reset_permissions();
        for p in [
            Permission::Follow,
            Permission::Comment,
            Permission::Write,
            Permission::Moderate,
            Permission::Admin,
        ] {
            assert!(!has_permission(bits, p));
        }
    }

    #[test]
    fn administrator_holds_all_bits() {
        assert_eq!(ADMINISTRATOR_BITS, 31);
        assert!(has_permission(ADMINISTRATOR_BITS, Permission::Admin));
    }

    #[test]
    fn exactly_one_default_role() {
        assert_eq!(DEFAULT_ROLES.iter().filter(|r| r.is_default).count(), 1);
    }
}
