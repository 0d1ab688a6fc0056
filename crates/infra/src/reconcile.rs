//! Reconciliation sweep over pending repair markers.
//!
//! The staff record is authoritative. For each marker:
//! - `OrphanIdentity`: drop the marker if a record now exists, otherwise delete
//!   the identity (an identity that is already gone counts as repaired).
//! - `StatusDrift`: set the provider's `disabled` flag to `!isActive` of the
//!   record, skipping the write when it already matches. A missing record or
//!   account leaves the marker pending.
//!
//! A marker re-recorded while the sweep works on it gets a new id, so the
//! sweep's `resolve` of the old id leaves it pending for the next pass.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use staffgate_core::{fields, STAFF_COLLECTION};

use crate::document_store::StoreError;
use crate::error::BackendError;
use crate::identity::{AccountUpdate, IdentityError};
use crate::provisioning::StaffProvisioner;
use crate::repairs::{PendingRepair, RepairKind};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub repaired: usize,
    pub remaining: usize,
}

impl StaffProvisioner {
    /// Work through every pending marker once.
    ///
    /// Fails only if the repair log itself cannot be read; per-marker failures
    /// are noted on the marker and counted in `remaining`.
    pub async fn reconcile(&self) -> Result<SweepReport, BackendError> {
        let pending = self.repairs.pending().await?;
        let mut report = SweepReport::default();

        for repair in pending {
            match self.repair(&repair).await {
                Ok(()) => {
                    if let Err(e) = self.repairs.resolve(repair.id).await {
                        warn!(repair_id = %repair.id, error = %e, "failed to resolve repair marker");
                        report.remaining += 1;
                        continue;
                    }
                    info!(staff_id = %repair.staff_id, kind = repair.kind.name(), "repair applied");
                    report.repaired += 1;
                }
                Err(e) => {
                    warn!(staff_id = %repair.staff_id, kind = repair.kind.name(), error = %e, "repair attempt failed");
                    if let Err(note) = self.repairs.note_failed_attempt(repair.id, &e.to_string()).await {
                        warn!(repair_id = %repair.id, error = %note, "failed to note repair attempt");
                    }
                    report.remaining += 1;
                }
            }
        }

        debug!(repaired = report.repaired, remaining = report.remaining, "reconciliation sweep done");
        Ok(report)
    }

    async fn repair(&self, repair: &PendingRepair) -> Result<(), BackendError> {
        let id = &repair.staff_id;
        let record = self
            .call("get_record", self.store.get(STAFF_COLLECTION, id.as_str()))
            .await?;

        match repair.kind {
            RepairKind::OrphanIdentity => {
                if record.is_some() {
                    return Ok(());
                }
                let account = self
                    .call("get_account", self.identity.get_account(id))
                    .await?;
                if account.is_none() {
                    debug!(staff_id = %id, "orphaned identity already gone");
                    return Ok(());
                }
                match self
                    .call("delete_account", self.identity.delete_account(id))
                    .await
                {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                }
            }
            RepairKind::StatusDrift { .. } => {
                let record = record.ok_or_else(|| {
                    StoreError::NotFound(format!("No staff record for id {id}"))
                })?;
                let is_active = record
                    .get(fields::IS_ACTIVE)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| {
                        StoreError::Codec(format!("staff record {id} has no boolean isActive"))
                    })?;
                let account = self
                    .call("get_account", self.identity.get_account(id))
                    .await?
                    .ok_or_else(|| {
                        IdentityError::NotFound(format!("No identity account for id {id}"))
                    })?;
                if account.disabled == !is_active {
                    debug!(staff_id = %id, is_active, "provider already matches the record");
                    return Ok(());
                }
                self.call(
                    "update_account",
                    self.identity
                        .update_account(id, &AccountUpdate::disabled(!is_active)),
                )
                .await
            }
        }
    }
}

/// Run [`StaffProvisioner::reconcile`] every `every` on the current runtime.
pub fn spawn_reconciler(provisioner: Arc<StaffProvisioner>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so start-up is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match provisioner.reconcile().await {
                Ok(report) if report.repaired > 0 || report.remaining > 0 => {
                    info!(repaired = report.repaired, remaining = report.remaining, "reconciliation sweep");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reconciliation sweep failed"),
            }
        }
    })
}
