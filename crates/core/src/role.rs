//! Staff roles.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role a staff member is provisioned with.
///
/// The set is closed: the role is copied both into the identity provider's
/// custom attributes and into the staff record, and downstream authorization
/// checks match on these exact strings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Doctor,
    Nurse,
    Receptionist,
    Admin,
}

impl StaffRole {
    /// Every accepted role, in the order they are listed to callers.
    pub const ALL: [StaffRole; 4] = [
        StaffRole::Doctor,
        StaffRole::Nurse,
        StaffRole::Receptionist,
        StaffRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Doctor => "doctor",
            StaffRole::Nurse => "nurse",
            StaffRole::Receptionist => "receptionist",
            StaffRole::Admin => "admin",
        }
    }

    /// Message returned when a caller submits a role outside [`StaffRole::ALL`].
    pub fn invalid_role_message() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(StaffRole::as_str).collect();
        format!("Invalid role. Must be one of: {}", names.join(", "))
    }
}

impl core::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = DomainError;

    // Matching is exact: "Doctor" or " nurse" are not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| DomainError::validation(Self::invalid_role_message()))
    }
}
