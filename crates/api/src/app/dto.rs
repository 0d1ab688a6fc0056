use serde::Deserialize;

use staffgate_core::StaffInput;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/create-staff`.
///
/// Fields stay optional so that missing ones are reported together by
/// validation rather than as a decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateStaffRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone_number: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
}

impl From<CreateStaffRequest> for StaffInput {
    fn from(req: CreateStaffRequest) -> Self {
        StaffInput {
            email: req.email,
            password: req.password,
            name: req.name,
            role: req.role,
            phone_number: req.phone_number,
            specialty: req.specialty,
            license_number: req.license_number,
        }
    }
}

/// Body of `PATCH /api/staff/:userId/status`. `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub is_active: Option<bool>,
}
