//! ERP Sync Boundary
//!
//! The core emits a finalized golden record (status `validated`) as an
//! immutable snapshot keyed by order id; the sync layer applies it
//! idempotently and reports back an outcome. The core records the report
//! in the audit trail but does not act on it beyond marking the terminal
//! `synced` status on success.

use crate::assembler::{GoldenRecord, RecordStatus};
use crate::db;
use chrono::Utc;
use ordreg_common::{Error, EventBus, OrdregEvent, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Immutable snapshot handed to the sync layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Idempotency key for the sync layer
    pub order_id: String,
    pub snapshot_at: chrono::DateTime<chrono::Utc>,
    pub record: GoldenRecord,
}

/// Outcome reported back by the sync layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// True when the ERP applied the record
    pub ok: bool,
    /// Sync-layer detail (ERP document number, error text)
    pub detail: String,
}

/// Sync boundary service
pub struct SyncService {
    db: SqlitePool,
    event_bus: EventBus,
}

impl SyncService {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Emit the snapshot for a validated record
    ///
    /// Only `validated` records may be emitted; blocking validations
    /// keep a record at `needs_review` and out of reach here.
    pub async fn emit_snapshot(&self, record_id: Uuid) -> Result<RecordSnapshot> {
        let record = db::records::fetch_record(&self.db, record_id).await?;
        if record.status != RecordStatus::Validated {
            return Err(Error::InvalidInput(format!(
                "record {} is '{}', only validated records sync",
                record_id,
                record.status.as_str()
            )));
        }

        let snapshot = RecordSnapshot {
            order_id: record.order_id.clone(),
            snapshot_at: Utc::now(),
            record,
        };

        db::audit::append(
            &self.db,
            record_id,
            "erp_sync",
            "snapshot_emitted",
            &json!({ "order_id": snapshot.order_id }),
        )
        .await?;

        info!(record_id = %record_id, order_id = %snapshot.order_id, "Sync snapshot emitted");
        Ok(snapshot)
    }

    /// Record the sync layer's report
    pub async fn record_report(&self, record_id: Uuid, report: SyncReport) -> Result<()> {
        let record = db::records::fetch_record(&self.db, record_id).await?;

        db::audit::append(
            &self.db,
            record_id,
            "erp_sync",
            "sync_reported",
            &json!({ "ok": report.ok, "detail": report.detail }),
        )
        .await?;

        if report.ok && record.status == RecordStatus::Validated {
            db::records::update_record_header(
                &self.db,
                record_id,
                RecordStatus::Synced,
                record.overall_confidence,
            )
            .await?;
        }

        self.event_bus.emit_lossy(OrdregEvent::SyncReported {
            record_id,
            outcome: if report.ok {
                "ok".to_string()
            } else {
                report.detail.clone()
            },
            timestamp: Utc::now(),
        });

        info!(record_id = %record_id, ok = report.ok, "Sync report recorded");
        Ok(())
    }
}
