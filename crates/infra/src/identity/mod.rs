//! Identity provider seam.
//!
//! The identity provider owns credentials, the enabled/disabled flag and the
//! custom attributes (claims) of each staff account. This service only consumes
//! the operations below.

pub mod http;
pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use staffgate_core::{CustomClaims, StaffId};

pub use http::HttpIdentityProvider;
pub use in_memory::InMemoryIdentityProvider;

/// Provider-reported failure. `Display` is the provider's message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// An account with the same e-mail already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// The provider rejected the input (weak password, malformed e-mail, ...).
    #[error("{0}")]
    InvalidArgument(String),

    /// No account with the given id.
    #[error("{0}")]
    NotFound(String),

    /// The provider could not be reached or is not serving.
    #[error("{0}")]
    Unavailable(String),

    /// Any other provider error.
    #[error("{0}")]
    Provider(String),
}

/// Operations of [`IdentityProvider`], used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityOp {
    CreateAccount,
    SetCustomAttributes,
    UpdateAccount,
    DeleteAccount,
    GetAccount,
}

/// Account to create.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl core::fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewIdentity")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Partial update of an existing account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl AccountUpdate {
    pub fn disabled(disabled: bool) -> Self {
        Self {
            disabled: Some(disabled),
        }
    }
}

/// Provider-side view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAccount {
    pub id: StaffId,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub custom_attributes: Map<String, Value>,
}

impl IdentityAccount {
    /// Role stored in the account's custom attributes, if any.
    pub fn role(&self) -> Option<&str> {
        self.custom_attributes.get("role").and_then(Value::as_str)
    }
}

/// Identity provider contract.
///
/// Every call is a remote operation that may fail independently; callers must
/// not assume a failed call had no effect.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and return the id the provider issued for it.
    async fn create_account(&self, account: &NewIdentity) -> Result<StaffId, IdentityError>;

    /// Replace the account's custom attributes.
    async fn set_custom_attributes(
        &self,
        id: &StaffId,
        claims: &CustomClaims,
    ) -> Result<(), IdentityError>;

    async fn update_account(&self, id: &StaffId, update: &AccountUpdate) -> Result<(), IdentityError>;

    /// Delete an account. Used to compensate a half-provisioned account.
    async fn delete_account(&self, id: &StaffId) -> Result<(), IdentityError>;

    async fn get_account(&self, id: &StaffId) -> Result<Option<IdentityAccount>, IdentityError>;
}
