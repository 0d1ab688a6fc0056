//! Custom attributes attached to an identity-provider account.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::role::StaffRole;

/// Claims written to the identity provider so downstream authorization checks
/// can read the staff member's role from their credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomClaims {
    pub role: StaffRole,
}

impl CustomClaims {
    pub fn new(role: StaffRole) -> Self {
        Self { role }
    }

    /// Flatten into the attribute map shape identity providers accept.
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert("role".to_string(), Value::String(self.role.as_str().to_string()));
        attrs
    }
}
