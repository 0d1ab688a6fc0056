use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use staffgate_core::StaffId;

use super::{PendingRepair, RepairKind, RepairLog};
use crate::document_store::StoreError;

/// In-memory repair log for tests/dev. Markers do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryRepairLog {
    inner: RwLock<Vec<PendingRepair>>,
}

impl InMemoryRepairLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the pending markers.
    pub fn snapshot(&self) -> Vec<PendingRepair> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<PendingRepair>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RepairLog for InMemoryRepairLog {
    async fn record(
        &self,
        staff_id: &StaffId,
        kind: RepairKind,
        reason: &str,
    ) -> Result<PendingRepair, StoreError> {
        let mut repairs = self.write();
        if let Some(existing) = repairs
            .iter_mut()
            .find(|r| &r.staff_id == staff_id && r.kind.name() == kind.name())
        {
            existing.id = Uuid::now_v7();
            existing.kind = kind;
            existing.reason = reason.to_string();
            return Ok(existing.clone());
        }

        let repair = PendingRepair {
            id: Uuid::now_v7(),
            staff_id: staff_id.clone(),
            kind,
            reason: reason.to_string(),
            recorded_at: Utc::now(),
            attempts: 0,
        };
        repairs.push(repair.clone());
        Ok(repair)
    }

    async fn pending(&self) -> Result<Vec<PendingRepair>, StoreError> {
        Ok(self.snapshot())
    }

    async fn resolve(&self, repair_id: Uuid) -> Result<(), StoreError> {
        self.write().retain(|r| r.id != repair_id);
        Ok(())
    }

    async fn note_failed_attempt(&self, repair_id: Uuid, reason: &str) -> Result<(), StoreError> {
        if let Some(repair) = self.write().iter_mut().find(|r| r.id == repair_id) {
            repair.attempts += 1;
            repair.reason = reason.to_string();
        }
        Ok(())
    }
}
