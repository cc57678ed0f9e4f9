use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in the identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// Authenticated caller, resolved at the HTTP edge and passed explicitly into use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}
