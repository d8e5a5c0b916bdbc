//! Account domain model.
//!
//! # Responsibility
//! - Define the portal user record and its admin roles.
//! - Derive publishing permissions from staff flag and role.
//!
//! # Invariants
//! - Permissions are never granted to non-staff accounts, whatever the role.
//! - `username` is unique and immutable after signup.

use super::EpochMillis;
use serde::{Deserialize, Serialize};

pub type AccountId = i64;

/// Leadership role attached to a staff account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    #[default]
    None,
    UnionPresident,
    UnionVicePresident,
    MediaAdmin,
    OperationsAdmin,
    CommitteeLead,
    DevAdmin,
}

impl AdminRole {
    pub const ALL: [AdminRole; 7] = [
        Self::None,
        Self::UnionPresident,
        Self::UnionVicePresident,
        Self::MediaAdmin,
        Self::OperationsAdmin,
        Self::CommitteeLead,
        Self::DevAdmin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UnionPresident => "union_president",
            Self::UnionVicePresident => "union_vice_president",
            Self::MediaAdmin => "media_admin",
            Self::OperationsAdmin => "operations_admin",
            Self::CommitteeLead => "committee_lead",
            Self::DevAdmin => "dev_admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "No Admin Role",
            Self::UnionPresident => "Union President",
            Self::UnionVicePresident => "Union Vice President",
            Self::MediaAdmin => "Media Admin",
            Self::OperationsAdmin => "Operations Admin",
            Self::CommitteeLead => "Committee Lead",
            Self::DevAdmin => "Development Admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }

    /// Roles allowed to create and delete hub tasks.
    pub fn publishes_tasks(self) -> bool {
        matches!(self, Self::UnionPresident | Self::UnionVicePresident)
    }

    /// Roles allowed to manage posts, videos and media.
    pub fn publishes_media(self) -> bool {
        matches!(
            self,
            Self::UnionPresident | Self::UnionVicePresident | Self::MediaAdmin
        )
    }
}

/// Portal account as seen by services and HTTP handlers.
///
/// The password hash is deliberately absent; see `AccountCredentials`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub admin_role: AdminRole,
    pub date_joined: EpochMillis,
    pub last_login: Option<EpochMillis>,
}

impl Account {
    pub fn display_name(&self) -> &str {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            self.username.as_str()
        } else {
            full_name
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff
    }

    pub fn can_publish_tasks(&self) -> bool {
        self.is_staff && self.admin_role.publishes_tasks()
    }

    pub fn can_publish_media(&self) -> bool {
        self.is_staff && self.admin_role.publishes_media()
    }
}

/// Insert model for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub admin_role: AdminRole,
}

/// Account row together with its stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account: Account,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(is_staff: bool, role: AdminRole) -> Account {
        Account {
            id: 1,
            username: "member".to_string(),
            email: String::new(),
            full_name: "  ".to_string(),
            phone: String::new(),
            is_staff,
            is_superuser: false,
            is_active: true,
            admin_role: role,
            date_joined: 0,
            last_login: None,
        }
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = account(false, AdminRole::None);
        assert_eq!(user.display_name(), "member");
        user.full_name = " Dana Reyes ".to_string();
        assert_eq!(user.display_name(), "Dana Reyes");
    }

    #[test]
    fn publishing_requires_staff_and_role() {
        assert!(account(true, AdminRole::UnionPresident).can_publish_tasks());
        assert!(account(true, AdminRole::UnionVicePresident).can_publish_media());
        assert!(account(true, AdminRole::MediaAdmin).can_publish_media());
        assert!(!account(true, AdminRole::MediaAdmin).can_publish_tasks());
        assert!(!account(true, AdminRole::OperationsAdmin).can_publish_media());
        assert!(!account(false, AdminRole::UnionPresident).can_publish_tasks());
        assert!(!account(false, AdminRole::MediaAdmin).can_publish_media());
    }

    #[test]
    fn role_strings_round_trip_through_parse() {
        for role in AdminRole::ALL {
            assert_eq!(AdminRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(AdminRole::parse("root"), None);
    }
}
