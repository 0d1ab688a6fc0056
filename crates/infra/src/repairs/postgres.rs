//! Postgres-backed repair log, so markers survive restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use staffgate_core::StaffId;

use super::{PendingRepair, RepairKind, RepairLog};
use crate::document_store::postgres::write_error;
use crate::document_store::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pending_repairs (
    id UUID PRIMARY KEY,
    staff_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    desired_active BOOLEAN,
    reason TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    attempts INTEGER NOT NULL DEFAULT 0,
    UNIQUE (staff_id, kind)
)
"#;

#[derive(Debug, Clone)]
pub struct PostgresRepairLog {
    pool: PgPool,
}

impl PostgresRepairLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }
}

fn decode(row: &PgRow) -> Result<PendingRepair, StoreError> {
    let codec = |e: sqlx::Error| StoreError::Codec(e.to_string());

    let staff_id: String = row.try_get("staff_id").map_err(codec)?;
    let kind: String = row.try_get("kind").map_err(codec)?;
    let desired_active: Option<bool> = row.try_get("desired_active").map_err(codec)?;
    let attempts: i32 = row.try_get("attempts").map_err(codec)?;

    let kind = match (kind.as_str(), desired_active) {
        ("orphan_identity", _) => RepairKind::OrphanIdentity,
        ("status_drift", Some(desired_active)) => RepairKind::StatusDrift { desired_active },
        (other, _) => {
            return Err(StoreError::Codec(format!("unknown repair kind '{other}'")));
        }
    };

    Ok(PendingRepair {
        id: row.try_get::<Uuid, _>("id").map_err(codec)?,
        staff_id: staff_id
            .parse()
            .map_err(|e: staffgate_core::DomainError| StoreError::Codec(e.to_string()))?,
        kind,
        reason: row.try_get("reason").map_err(codec)?,
        recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at").map_err(codec)?,
        attempts: u32::try_from(attempts).unwrap_or(0),
    })
}

#[async_trait]
impl RepairLog for PostgresRepairLog {
    async fn record(
        &self,
        staff_id: &StaffId,
        kind: RepairKind,
        reason: &str,
    ) -> Result<PendingRepair, StoreError> {
        let desired_active = match kind {
            RepairKind::StatusDrift { desired_active } => Some(desired_active),
            RepairKind::OrphanIdentity => None,
        };

        let row = sqlx::query(
            r#"
            INSERT INTO pending_repairs (id, staff_id, kind, desired_active, reason)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (staff_id, kind)
            DO UPDATE SET
                id = EXCLUDED.id,
                desired_active = EXCLUDED.desired_active,
                reason = EXCLUDED.reason
            RETURNING id, staff_id, kind, desired_active, reason, recorded_at, attempts
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(staff_id.as_str())
        .bind(kind.name())
        .bind(desired_active)
        .bind(reason)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        decode(&row)
    }

    async fn pending(&self) -> Result<Vec<PendingRepair>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, staff_id, kind, desired_active, reason, recorded_at, attempts
            FROM pending_repairs
            ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(write_error)?;

        rows.iter().map(decode).collect()
    }

    async fn resolve(&self, repair_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM pending_repairs WHERE id = $1")
            .bind(repair_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn note_failed_attempt(&self, repair_id: Uuid, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE pending_repairs
            SET attempts = attempts + 1, reason = $2
            WHERE id = $1
            "#,
        )
        .bind(repair_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }
}
