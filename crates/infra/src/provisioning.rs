//! Staff provisioning saga.
//!
//! One logical staff account lives in two places: an identity-provider account
//! (credentials, role claim, disabled flag) and a staff record in the document
//! store. Neither backend offers a transaction spanning both, so each operation
//! runs as an ordered sequence of steps:
//!
//! ```text
//! create_staff:  create identity -> assign role claim -> write record
//! set_active:    load record -> update record -> mirror disabled flag
//! ```
//!
//! A step only runs once the previous one succeeded. When a step fails after
//! an earlier step already changed a backend, the saga either compensates
//! (undoes the earlier step) or leaves the state alone and records a repair
//! marker, depending on [`CompensationPolicy`]. A failed compensation is also
//! recorded. The caller always learns which of the three happened.
//!
//! A step that timed out may still have been applied remotely. Undoing it
//! could then create the inconsistency it was meant to avoid, so a timed-out
//! record write or provider mirror is never compensated: it is always recorded
//! and left to the reconciliation sweep, which treats the record as
//! authoritative.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use staffgate_core::{fields, CustomClaims, NewStaff, StaffId, StaffRecord, STAFF_COLLECTION};

use crate::document_store::{DocumentStore, DocumentWrite, StoreError};
use crate::error::BackendError;
use crate::identity::{AccountUpdate, IdentityProvider, NewIdentity};
use crate::repairs::{RepairKind, RepairLog};

/// Default bound on a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when a step fails after an earlier step changed a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompensationPolicy {
    /// Undo the earlier steps; record a repair marker only if undoing fails.
    #[default]
    Compensate,
    /// Leave the partial state in place and record a repair marker.
    RecordOnly,
}

/// Saga step, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateIdentity,
    AssignRole,
    WriteRecord,
    LoadRecord,
    UpdateRecord,
    MirrorIdentity,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CreateIdentity => "create_identity",
            Stage::AssignRole => "assign_role",
            Stage::WriteRecord => "write_record",
            Stage::LoadRecord => "load_record",
            Stage::UpdateRecord => "update_record",
            Stage::MirrorIdentity => "mirror_identity",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a partial failure was left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aftermath {
    /// Earlier steps were undone; the account is back to its prior state.
    Compensated,
    /// The inconsistency remains. `repair_id` is the marker recorded for it,
    /// `None` if even recording failed.
    Unresolved { repair_id: Option<Uuid> },
}

/// Failure of a saga operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StaffError {
    /// The failing step was the first to touch a backend: nothing changed.
    #[error("{stage} failed: {source}")]
    Aborted {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    /// The failing step ran after earlier steps had changed a backend, or it
    /// timed out and may have changed one itself.
    #[error("{stage} failed after earlier steps succeeded: {source}")]
    Partial {
        stage: Stage,
        staff_id: StaffId,
        #[source]
        source: BackendError,
        aftermath: Aftermath,
    },
}

impl StaffError {
    pub fn stage(&self) -> Stage {
        match self {
            StaffError::Aborted { stage, .. } | StaffError::Partial { stage, .. } => *stage,
        }
    }

    /// The backend error that stopped the saga.
    pub fn backend_error(&self) -> &BackendError {
        match self {
            StaffError::Aborted { source, .. } | StaffError::Partial { source, .. } => source,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, StaffError::Partial { .. })
    }

    pub fn compensated(&self) -> bool {
        matches!(
            self,
            StaffError::Partial {
                aftermath: Aftermath::Compensated,
                ..
            }
        )
    }

    pub fn repair_id(&self) -> Option<Uuid> {
        match self {
            StaffError::Partial {
                aftermath: Aftermath::Unresolved { repair_id },
                ..
            } => *repair_id,
            _ => None,
        }
    }
}

/// Result of a successful status toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub staff_id: StaffId,
    pub is_active: bool,
}

/// Orchestrates both staff operations against the two backends.
///
/// Constructed once at start-up and shared across requests; it holds no
/// per-request state.
pub struct StaffProvisioner {
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) repairs: Arc<dyn RepairLog>,
    pub(crate) policy: CompensationPolicy,
    pub(crate) timeout: Duration,
}

impl StaffProvisioner {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        repairs: Arc<dyn RepairLog>,
    ) -> Self {
        Self {
            identity,
            store,
            repairs,
            policy: CompensationPolicy::default(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: CompensationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repairs(&self) -> &Arc<dyn RepairLog> {
        &self.repairs
    }

    /// Provision a staff account: identity, role claim, then record.
    pub async fn create_staff(&self, staff: NewStaff) -> Result<StaffId, StaffError> {
        let identity = NewIdentity {
            email: staff.email.clone(),
            password: staff.password.clone(),
            display_name: staff.name.clone(),
        };

        let id = self
            .call("create_account", self.identity.create_account(&identity))
            .await
            .map_err(|source| {
                warn!(email = %staff.email, error = %source, "identity creation failed");
                StaffError::Aborted {
                    stage: Stage::CreateIdentity,
                    source,
                }
            })?;
        debug!(staff_id = %id, "identity created");

        let claims = CustomClaims::new(staff.role);
        if let Err(source) = self
            .call("set_custom_attributes", self.identity.set_custom_attributes(&id, &claims))
            .await
        {
            return Err(self.unwind_create(id, Stage::AssignRole, source).await);
        }
        debug!(staff_id = %id, role = %staff.role, "role claim assigned");

        let record = StaffRecord::provisioned(id.clone(), &staff);
        let written = match DocumentWrite::from_serialize(&record) {
            Ok(write) => {
                let write = write
                    .server_timestamp(fields::CREATED_AT)
                    .server_timestamp(fields::UPDATED_AT);
                self.call("put_record", self.store.put(STAFF_COLLECTION, id.as_str(), write))
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(source) = written {
            return Err(self.unwind_create(id, Stage::WriteRecord, source).await);
        }

        info!(staff_id = %id, role = %staff.role, "staff member provisioned");
        Ok(id)
    }

    /// Set a staff member's active flag: record first, then the provider's
    /// `disabled` flag (always `!is_active`).
    pub async fn set_active(&self, id: &StaffId, is_active: bool) -> Result<StatusChange, StaffError> {
        let current = self
            .call("get_record", self.store.get(STAFF_COLLECTION, id.as_str()))
            .await
            .and_then(|doc| {
                doc.ok_or_else(|| {
                    StoreError::NotFound(format!("No staff record for id {id}")).into()
                })
            })
            .map_err(|source| StaffError::Aborted {
                stage: Stage::LoadRecord,
                source,
            })?;
        let previous = current.get(fields::IS_ACTIVE).and_then(Value::as_bool);

        let write = DocumentWrite::new()
            .set(fields::IS_ACTIVE, is_active)
            .server_timestamp(fields::UPDATED_AT);
        if let Err(source) = self
            .call("update_record", self.store.update(STAFF_COLLECTION, id.as_str(), write))
            .await
        {
            warn!(staff_id = %id, error = %source, "staff record update failed");
            let stage = Stage::UpdateRecord;
            if !source.is_timeout() {
                return Err(StaffError::Aborted { stage, source });
            }
            // The record may now hold the new value while the provider does not.
            let reason = format!("{stage} outcome unknown: {source}");
            let drift = RepairKind::StatusDrift { desired_active: is_active };
            let aftermath = self.mark(id, drift, &reason).await;
            return Err(StaffError::Partial {
                stage,
                staff_id: id.clone(),
                source,
                aftermath,
            });
        }

        let update = AccountUpdate::disabled(!is_active);
        if let Err(source) = self
            .call("update_account", self.identity.update_account(id, &update))
            .await
        {
            return Err(self.unwind_status(id, previous, is_active, source).await);
        }

        info!(staff_id = %id, is_active, "staff status updated");
        Ok(StatusChange {
            staff_id: id.clone(),
            is_active,
        })
    }

    /// Run one backend call under the configured timeout.
    pub(crate) async fn call<T, E>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, BackendError>
    where
        E: Into<BackendError>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(BackendError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }

    async fn unwind_create(&self, id: StaffId, stage: Stage, source: BackendError) -> StaffError {
        warn!(staff_id = %id, %stage, error = %source, "staff provisioning failed part-way");

        let aftermath = match self.policy {
            // The record may have landed; deleting the identity could strand it.
            _ if stage == Stage::WriteRecord && source.is_timeout() => {
                let reason = format!("{stage} outcome unknown: {source}");
                self.mark(&id, RepairKind::OrphanIdentity, &reason).await
            }
            CompensationPolicy::Compensate => {
                match self
                    .call("delete_account", self.identity.delete_account(&id))
                    .await
                {
                    Ok(()) => {
                        info!(staff_id = %id, "orphaned identity deleted");
                        Aftermath::Compensated
                    }
                    Err(e) => {
                        let reason = format!("{stage} failed: {source}; delete failed: {e}");
                        self.mark(&id, RepairKind::OrphanIdentity, &reason).await
                    }
                }
            }
            CompensationPolicy::RecordOnly => {
                let reason = format!("{stage} failed: {source}");
                self.mark(&id, RepairKind::OrphanIdentity, &reason).await
            }
        };

        StaffError::Partial {
            stage,
            staff_id: id,
            source,
            aftermath,
        }
    }

    async fn unwind_status(
        &self,
        id: &StaffId,
        previous: Option<bool>,
        desired_active: bool,
        source: BackendError,
    ) -> StaffError {
        let stage = Stage::MirrorIdentity;
        warn!(staff_id = %id, error = %source, "identity status mirror failed");

        let drift = RepairKind::StatusDrift { desired_active };
        let aftermath = match (self.policy, previous) {
            // The provider may already carry the new flag; keep the record as is.
            _ if source.is_timeout() => {
                let reason = format!("{stage} outcome unknown: {source}");
                self.mark(id, drift, &reason).await
            }
            (CompensationPolicy::Compensate, Some(previous)) => {
                let restore = DocumentWrite::new()
                    .set(fields::IS_ACTIVE, previous)
                    .server_timestamp(fields::UPDATED_AT);
                match self
                    .call("restore_record", self.store.update(STAFF_COLLECTION, id.as_str(), restore))
                    .await
                {
                    Ok(()) => {
                        info!(staff_id = %id, is_active = previous, "staff record restored");
                        Aftermath::Compensated
                    }
                    Err(e) => {
                        let reason = format!("{stage} failed: {source}; restore failed: {e}");
                        self.mark(id, drift, &reason).await
                    }
                }
            }
            (CompensationPolicy::Compensate, None) => {
                let reason = format!("{stage} failed: {source}; no previous isActive to restore");
                self.mark(id, drift, &reason).await
            }
            (CompensationPolicy::RecordOnly, _) => {
                let reason = format!("{stage} failed: {source}");
                self.mark(id, drift, &reason).await
            }
        };

        StaffError::Partial {
            stage,
            staff_id: id.clone(),
            source,
            aftermath,
        }
    }

    async fn mark(&self, id: &StaffId, kind: RepairKind, reason: &str) -> Aftermath {
        match self.repairs.record(id, kind, reason).await {
            Ok(repair) => {
                warn!(staff_id = %id, repair_id = %repair.id, kind = kind.name(), "repair marker recorded");
                Aftermath::Unresolved {
                    repair_id: Some(repair.id),
                }
            }
            Err(e) => {
                error!(staff_id = %id, kind = kind.name(), error = %e, reason, "failed to record repair marker");
                Aftermath::Unresolved { repair_id: None }
            }
        }
    }
}
