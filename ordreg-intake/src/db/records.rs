//! Golden record persistence
//!
//! Records are written once by the pipeline and mutated only by review
//! decision application and sync status changes. Line validations hold
//! the current rule outcomes; history lives in the audit trail.

use crate::assembler::{GoldenRecord, LineItem, Provenance, RecordStatus};
use crate::types::{MatchTier, RoutingDecision, RuleOutcome, RuleStatus, SkuMatch};
use chrono::{DateTime, Utc};
use ordreg_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Persist a freshly assembled golden record (header + lines +
/// validations + runner-up matches) in one transaction
pub async fn persist_record(pool: &SqlitePool, record: &GoldenRecord) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO golden_records
            (guid, order_id, customer_id, channel, status, overall_confidence,
             extraction_failed, promised_date, received_at, assembled_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.record_id.to_string())
    .bind(&record.order_id)
    .bind(&record.customer_id)
    .bind(&record.channel)
    .bind(record.status.as_str())
    .bind(record.overall_confidence)
    .bind(record.extraction_failed as i64)
    .bind(&record.promised_date)
    .bind(record.received_at.to_rfc3339())
    .bind(record.assembled_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    for line in &record.lines {
        insert_line_tx(&mut tx, record.record_id, line).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Insert one line item with its validations and runner-ups
async fn insert_line_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record_id: Uuid,
    line: &LineItem,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO line_items
            (guid, record_guid, candidate_index, description, quantity, uom,
             unit_price, extraction_confidence, sku_id, match_score, match_tier,
             composite, decision, extractor)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(line.line_id.to_string())
    .bind(record_id.to_string())
    .bind(line.candidate_index as i64)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(&line.uom)
    .bind(line.unit_price)
    .bind(line.extraction_confidence)
    .bind(&line.sku_id)
    .bind(line.match_score)
    .bind(line.match_tier.map(|t| t.as_str()))
    .bind(line.composite)
    .bind(line.decision.as_str())
    .bind(&line.provenance.extractor)
    .execute(&mut **tx)
    .await?;

    for outcome in &line.validations {
        sqlx::query(
            "INSERT INTO line_validations (line_guid, rule, status, message) VALUES (?, ?, ?, ?)",
        )
        .bind(line.line_id.to_string())
        .bind(&outcome.rule)
        .bind(outcome.status.as_str())
        .bind(&outcome.message)
        .execute(&mut **tx)
        .await?;
    }

    for (rank, m) in line.runner_ups.iter().enumerate() {
        sqlx::query(
            "INSERT INTO line_matches (line_guid, rank, sku_id, score, tier) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(line.line_id.to_string())
        // Rank 0 is the retained top match on the line row itself
        .bind((rank + 1) as i64)
        .bind(&m.sku_id)
        .bind(m.score)
        .bind(m.tier.as_str())
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Insert a single line outside assembly (review split)
pub async fn insert_line(pool: &SqlitePool, record_id: Uuid, line: &LineItem) -> Result<()> {
    let mut tx = pool.begin().await?;
    insert_line_tx(&mut tx, record_id, line).await?;
    tx.commit().await?;
    Ok(())
}

/// Fetch a full golden record with lines, validations, and runner-ups
pub async fn fetch_record(pool: &SqlitePool, record_id: Uuid) -> Result<GoldenRecord> {
    let header: Option<(
        String,
        String,
        String,
        String,
        f64,
        i64,
        Option<String>,
        String,
        String,
    )> = sqlx::query_as(
        r#"
        SELECT order_id, customer_id, channel, status, overall_confidence,
               extraction_failed, promised_date, received_at, assembled_at
        FROM golden_records WHERE guid = ?
        "#,
    )
    .bind(record_id.to_string())
    .fetch_optional(pool)
    .await?;

    let (
        order_id,
        customer_id,
        channel,
        status,
        overall_confidence,
        extraction_failed,
        promised_date,
        received_at,
        assembled_at,
    ) = header.ok_or_else(|| Error::NotFound(format!("golden record {}", record_id)))?;

    let status = RecordStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Invalid record status '{}'", status)))?;

    let line_rows: Vec<LineRow> = sqlx::query_as(
        r#"
        SELECT guid, candidate_index, description, quantity, uom, unit_price,
               extraction_confidence, sku_id, match_score, match_tier, composite,
               decision, extractor
        FROM line_items WHERE record_guid = ? ORDER BY candidate_index ASC
        "#,
    )
    .bind(record_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut lines = Vec::with_capacity(line_rows.len());
    for row in line_rows {
        lines.push(line_from_row(pool, row).await?);
    }

    Ok(GoldenRecord {
        record_id,
        order_id,
        customer_id,
        channel,
        received_at: parse_timestamp(&received_at)?,
        assembled_at: parse_timestamp(&assembled_at)?,
        promised_date,
        status,
        overall_confidence,
        extraction_failed: extraction_failed != 0,
        lines,
    })
}

/// Fetch one line item and its owning record id
pub async fn fetch_line(pool: &SqlitePool, line_id: Uuid) -> Result<(Uuid, LineItem)> {
    let record_guid: Option<(String,)> =
        sqlx::query_as("SELECT record_guid FROM line_items WHERE guid = ?")
            .bind(line_id.to_string())
            .fetch_optional(pool)
            .await?;

    let (record_guid,) =
        record_guid.ok_or_else(|| Error::NotFound(format!("line item {}", line_id)))?;
    let record_id = parse_uuid(&record_guid)?;

    let row: LineRow = sqlx::query_as(
        r#"
        SELECT guid, candidate_index, description, quantity, uom, unit_price,
               extraction_confidence, sku_id, match_score, match_tier, composite,
               decision, extractor
        FROM line_items WHERE guid = ?
        "#,
    )
    .bind(line_id.to_string())
    .fetch_one(pool)
    .await?;

    let line = line_from_row(pool, row).await?;
    Ok((record_id, line))
}

/// Update a line item after a review decision (fields + current
/// validations are replaced; the audit trail carries history)
pub async fn update_line(pool: &SqlitePool, line: &LineItem) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE line_items SET
            description = ?, quantity = ?, uom = ?, unit_price = ?,
            sku_id = ?, match_score = ?, match_tier = ?,
            composite = ?, decision = ?, updated_at = CURRENT_TIMESTAMP
        WHERE guid = ?
        "#,
    )
    .bind(&line.description)
    .bind(line.quantity)
    .bind(&line.uom)
    .bind(line.unit_price)
    .bind(&line.sku_id)
    .bind(line.match_score)
    .bind(line.match_tier.map(|t| t.as_str()))
    .bind(line.composite)
    .bind(line.decision.as_str())
    .bind(line.line_id.to_string())
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM line_validations WHERE line_guid = ?")
        .bind(line.line_id.to_string())
        .execute(&mut *tx)
        .await?;

    for outcome in &line.validations {
        sqlx::query(
            "INSERT INTO line_validations (line_guid, rule, status, message) VALUES (?, ?, ?, ?)",
        )
        .bind(line.line_id.to_string())
        .bind(&outcome.rule)
        .bind(outcome.status.as_str())
        .bind(&outcome.message)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Remove a line item (review merge folds it into a sibling)
pub async fn delete_line(pool: &SqlitePool, line_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM line_validations WHERE line_guid = ?")
        .bind(line_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM line_matches WHERE line_guid = ?")
        .bind(line_id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM line_items WHERE guid = ?")
        .bind(line_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Update record header status and overall confidence
pub async fn update_record_header(
    pool: &SqlitePool,
    record_id: Uuid,
    status: RecordStatus,
    overall_confidence: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE golden_records SET status = ?, overall_confidence = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
    )
    .bind(status.as_str())
    .bind(overall_confidence)
    .bind(record_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// One entry of the human review queue
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewQueueEntry {
    pub record_id: Uuid,
    pub line_id: Uuid,
    pub order_id: String,
    pub customer_id: String,
    pub description: String,
    pub quantity: f64,
    pub sku_id: Option<String>,
    pub composite: f64,
    /// quantity × unit price; 0 when no price was extracted
    pub line_value: f64,
}

/// List lines awaiting review, weakest confidence first, then highest
/// business impact
pub async fn review_queue(pool: &SqlitePool) -> Result<Vec<ReviewQueueEntry>> {
    let rows: Vec<(String, String, String, String, String, f64, Option<String>, f64, f64)> =
        sqlx::query_as(
            r#"
            SELECT l.record_guid, l.guid, r.order_id, r.customer_id, l.description,
                   l.quantity, l.sku_id, l.composite,
                   COALESCE(l.unit_price * l.quantity, 0.0) AS line_value
            FROM line_items l
            JOIN golden_records r ON r.guid = l.record_guid
            WHERE l.decision = 'needs_review'
              AND r.status NOT IN ('synced', 'rejected')
            ORDER BY l.composite ASC, line_value DESC, l.guid ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(
            |(record_guid, guid, order_id, customer_id, description, quantity, sku_id, composite, line_value)| {
                Ok(ReviewQueueEntry {
                    record_id: parse_uuid(&record_guid)?,
                    line_id: parse_uuid(&guid)?,
                    order_id,
                    customer_id,
                    description,
                    quantity,
                    sku_id,
                    composite,
                    line_value,
                })
            },
        )
        .collect()
}

// ============================================================================
// Row mapping
// ============================================================================

type LineRow = (
    String,         // guid
    i64,            // candidate_index
    String,         // description
    f64,            // quantity
    Option<String>, // uom
    Option<f64>,    // unit_price
    f64,            // extraction_confidence
    Option<String>, // sku_id
    f64,            // match_score
    Option<String>, // match_tier
    f64,            // composite
    String,         // decision
    String,         // extractor
);

/// Rebuild a LineItem from its row plus child tables
async fn line_from_row(pool: &SqlitePool, row: LineRow) -> Result<LineItem> {
    let (
        guid,
        candidate_index,
        description,
        quantity,
        uom,
        unit_price,
        extraction_confidence,
        sku_id,
        match_score,
        match_tier,
        composite,
        decision,
        extractor,
    ) = row;

    let line_id = parse_uuid(&guid)?;

    let validation_rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT rule, status, message FROM line_validations WHERE line_guid = ? ORDER BY id ASC",
    )
    .bind(&guid)
    .fetch_all(pool)
    .await?;

    let validations: Vec<RuleOutcome> = validation_rows
        .into_iter()
        .map(|(rule, status, message)| {
            let status = RuleStatus::parse(&status)
                .ok_or_else(|| Error::Internal(format!("Invalid rule status '{}'", status)))?;
            Ok(RuleOutcome {
                rule,
                status,
                message,
            })
        })
        .collect::<Result<_>>()?;

    let match_rows: Vec<(String, f64, String)> = sqlx::query_as(
        "SELECT sku_id, score, tier FROM line_matches WHERE line_guid = ? ORDER BY rank ASC",
    )
    .bind(&guid)
    .fetch_all(pool)
    .await?;

    let runner_ups: Vec<SkuMatch> = match_rows
        .into_iter()
        .map(|(sku_id, score, tier)| {
            let tier = MatchTier::parse(&tier)
                .ok_or_else(|| Error::Internal(format!("Invalid match tier '{}'", tier)))?;
            Ok(SkuMatch {
                sku_id,
                score,
                tier,
            })
        })
        .collect::<Result<_>>()?;

    let decision = RoutingDecision::parse(&decision)
        .ok_or_else(|| Error::Internal(format!("Invalid decision '{}'", decision)))?;
    let match_tier = match match_tier {
        Some(t) => Some(
            MatchTier::parse(&t)
                .ok_or_else(|| Error::Internal(format!("Invalid match tier '{}'", t)))?,
        ),
        None => None,
    };

    let rules = validations.iter().map(|o| o.rule.clone()).collect();

    Ok(LineItem {
        line_id,
        candidate_index: candidate_index as usize,
        description,
        quantity,
        uom,
        unit_price,
        extraction_confidence,
        sku_id,
        match_score,
        match_tier,
        runner_ups,
        validations,
        composite,
        decision,
        provenance: Provenance {
            extractor,
            match_tier: match_tier.map(|t| t.as_str().to_string()),
            rules,
        },
    })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}
