use std::time::Duration;

use thiserror::Error;

use crate::document_store::StoreError;
use crate::identity::IdentityError;

/// Failure of a single backend call made by the provisioning saga.
///
/// `Display` is the backend's own message so it can be handed to the caller
/// verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The call did not complete within the configured backend timeout. The
    /// remote side may still have applied it.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl BackendError {
    /// The outcome of the call is unknown: it may or may not have been applied.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackendError::Identity(IdentityError::NotFound(_))
                | BackendError::Store(StoreError::NotFound(_))
        )
    }
}
