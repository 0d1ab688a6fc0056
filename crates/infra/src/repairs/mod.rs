//! Repair markers for staff accounts left inconsistent by a partial failure.
//!
//! A marker is written whenever the provisioning saga stops with the identity
//! provider and the document store disagreeing and no compensation undid it.
//! The reconciliation sweep works through the pending markers.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use staffgate_core::StaffId;

use crate::document_store::StoreError;

pub use in_memory::InMemoryRepairLog;
pub use postgres::PostgresRepairLog;

/// What is inconsistent about the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RepairKind {
    /// Identity exists without a staff record.
    OrphanIdentity,
    /// The record's `isActive` and the provider's `disabled` flag disagree.
    StatusDrift { desired_active: bool },
}

impl RepairKind {
    /// Stable name of the variant, ignoring its payload.
    pub fn name(&self) -> &'static str {
        match self {
            RepairKind::OrphanIdentity => "orphan_identity",
            RepairKind::StatusDrift { .. } => "status_drift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRepair {
    pub id: Uuid,
    pub staff_id: StaffId,
    #[serde(flatten)]
    pub kind: RepairKind,
    /// Last error seen for this account.
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
    /// Failed reconciliation attempts so far.
    pub attempts: u32,
}

/// Ledger of pending repairs.
///
/// At most one marker per `(staff_id, kind name)` is pending. Recording again
/// replaces the payload and reason of the existing marker and gives it a new
/// id, so a sweep that read the old marker cannot resolve the new one.
#[async_trait]
pub trait RepairLog: Send + Sync {
    async fn record(
        &self,
        staff_id: &StaffId,
        kind: RepairKind,
        reason: &str,
    ) -> Result<PendingRepair, StoreError>;

    /// Pending markers, oldest first.
    async fn pending(&self) -> Result<Vec<PendingRepair>, StoreError>;

    async fn resolve(&self, repair_id: Uuid) -> Result<(), StoreError>;

    async fn note_failed_attempt(&self, repair_id: Uuid, reason: &str) -> Result<(), StoreError>;
}
