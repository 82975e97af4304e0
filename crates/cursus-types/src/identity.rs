//! Verified caller identity.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role claim carried by a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

crate::status_enum!(Role, "role", {
    Student => "student",
    Admin => "admin",
});

/// A caller whose session token has been verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub role: Role,
}

impl VerifiedIdentity {
    pub fn student(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::Student,
        }
    }

    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this caller may act on `target_user`'s records.
    pub fn may_act_for(&self, target_user: &str) -> bool {
        self.is_admin() || self.user_id == target_user
    }
}
