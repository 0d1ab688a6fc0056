//! Staff provisioning input and the persisted staff record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::StaffId;
use crate::role::StaffRole;

/// Document-store collection holding staff records.
pub const STAFF_COLLECTION: &str = "users";

/// Record field names that are written by the application and read back by
/// the orchestrator.
pub mod fields {
    pub const IS_ACTIVE: &str = "isActive";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Raw provisioning input, as decoded from the caller.
///
/// Every field is optional here so "absent" can be told apart from a bad value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone_number: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
}

/// Validated request to provision a staff account.
#[derive(Clone, PartialEq, Eq)]
pub struct NewStaff {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: StaffRole,
    pub phone_number: String,
    pub specialty: String,
    pub license_number: String,
}

impl core::fmt::Debug for NewStaff {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewStaff")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("phone_number", &self.phone_number)
            .field("specialty", &self.specialty)
            .field("license_number", &self.license_number)
            .finish()
    }
}

impl NewStaff {
    /// Validate raw input.
    ///
    /// Required fields are checked before the role, so a request missing both
    /// `name` and a valid role reports the missing field. An empty string counts
    /// as missing; optional fields default to the empty string.
    pub fn validate(input: StaffInput) -> DomainResult<Self> {
        let StaffInput {
            email,
            password,
            name,
            role,
            phone_number,
            specialty,
            license_number,
        } = input;

        let mut missing = Vec::new();
        let email = required("email", email, &mut missing);
        let password = required("password", password, &mut missing);
        let name = required("name", name, &mut missing);
        let role = required("role", role, &mut missing);
        if !missing.is_empty() {
            return Err(DomainError::MissingFields(missing));
        }

        let role: StaffRole = role.parse()?;

        Ok(Self {
            email,
            password,
            name,
            role,
            phone_number: phone_number.unwrap_or_default(),
            specialty: specialty.unwrap_or_default(),
            license_number: license_number.unwrap_or_default(),
        })
    }
}

fn required(field: &'static str, value: Option<String>, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// Staff record as stored in the document store (camelCase on the wire).
///
/// `created_at`/`updated_at` are assigned by the store; they are `None` on a
/// record that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRecord {
    pub id: StaffId,
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub license_number: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StaffRecord {
    /// Record for a freshly provisioned account: active, timestamps unset.
    pub fn provisioned(id: StaffId, staff: &NewStaff) -> Self {
        Self {
            id,
            email: staff.email.clone(),
            name: staff.name.clone(),
            role: staff.role,
            phone_number: staff.phone_number.clone(),
            specialty: staff.specialty.clone(),
            license_number: staff.license_number.clone(),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }
}
