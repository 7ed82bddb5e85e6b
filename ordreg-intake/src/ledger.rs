//! Intake Ledger
//!
//! Deduplicates inbound requests by a stable identity key:
//! `(customer_id, channel, fingerprint)` where the fingerprint is a
//! SHA-256 of the whitespace-collapsed, case-folded message content.
//!
//! Admission is a single `INSERT ... ON CONFLICT DO NOTHING` against the
//! UNIQUE dedup_key column — the check-and-set is atomic in the
//! database, so two near-simultaneous deliveries of the same message
//! cannot both be accepted. The ledger is append-only and never rolled
//! back: a request admitted before a downstream failure stays admitted,
//! and the retry reports `Duplicate`.

use chrono::{DateTime, Utc};
use ordreg_common::fingerprint::{dedup_key, message_fingerprint};
use ordreg_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of an admission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// New request; a golden record id has been reserved for it
    Accepted {
        record_id: Uuid,
        order_id: String,
    },
    /// Same logical request seen before; no further processing
    Duplicate { prior_record_id: Uuid },
}

/// An inbound request at the ledger boundary
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub customer_id: String,
    pub channel: String,
    pub text: String,
    pub attachments: Vec<String>,
    /// Requested delivery date, when the channel carries one
    pub promised_date: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Intake Ledger
pub struct IntakeLedger {
    db: SqlitePool,
}

impl IntakeLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Admit a request, or report the duplicate it repeats
    ///
    /// Idempotent under retried deliveries: the same message admits once
    /// and every retry returns `Duplicate` with the prior record id.
    pub async fn admit(&self, request: &InboundRequest) -> Result<Admission> {
        let fingerprint = message_fingerprint(&request.text);
        let key = dedup_key(&request.customer_id, &request.channel, &request.text);
        let record_id = Uuid::new_v4();
        let order_id = order_id_from_fingerprint(&fingerprint);

        debug!(
            customer_id = %request.customer_id,
            channel = %request.channel,
            fingerprint = %fingerprint,
            "Admission check"
        );

        let attachments = serde_json::to_string(&request.attachments)
            .map_err(|e| Error::Internal(format!("Serialize attachments failed: {}", e)))?;

        // Atomic check-and-set: the UNIQUE key decides, not a prior read
        let inserted = sqlx::query(
            r#"
            INSERT INTO intake_ledger
                (dedup_key, customer_id, channel, fingerprint, raw_text, attachments,
                 record_guid, received_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(dedup_key) DO NOTHING
            "#,
        )
        .bind(&key)
        .bind(&request.customer_id)
        .bind(&request.channel)
        .bind(&fingerprint)
        .bind(&request.text)
        .bind(&attachments)
        .bind(record_id.to_string())
        .bind(request.received_at.to_rfc3339())
        .execute(&self.db)
        .await?
        .rows_affected();

        if inserted == 1 {
            info!(record_id = %record_id, order_id = %order_id, "Request admitted");
            return Ok(Admission::Accepted {
                record_id,
                order_id,
            });
        }

        // Key already present: fetch the record the prior admission created
        let (prior,): (String,) =
            sqlx::query_as("SELECT record_guid FROM intake_ledger WHERE dedup_key = ?")
                .bind(&key)
                .fetch_one(&self.db)
                .await?;

        let prior_record_id = Uuid::parse_str(&prior)
            .map_err(|e| Error::Internal(format!("Invalid UUID in ledger: {}", e)))?;

        info!(prior_record_id = %prior_record_id, "Duplicate delivery suppressed");
        Ok(Admission::Duplicate { prior_record_id })
    }
}

/// Human-facing order id derived from the message fingerprint
fn order_id_from_fingerprint(fingerprint: &str) -> String {
    format!("REQ-{}", &fingerprint[..8])
}
