//! Intake service table schemas
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS` migrations, applied at every
//! startup after the shared tables.

use ordreg_common::Result;
use sqlx::SqlitePool;

/// Create all intake service tables
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_intake_ledger_table(pool).await?;
    create_golden_records_table(pool).await?;
    create_line_items_table(pool).await?;
    create_line_matches_table(pool).await?;
    create_line_validations_table(pool).await?;
    create_audit_trail_table(pool).await?;
    create_customers_table(pool).await?;
    Ok(())
}

/// Append-only request ledger; the UNIQUE dedup_key is the atomic
/// admission gate
async fn create_intake_ledger_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS intake_ledger (
            dedup_key TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            channel TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            attachments TEXT NOT NULL DEFAULT '[]',
            record_guid TEXT NOT NULL,
            received_at TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_golden_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS golden_records (
            guid TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            channel TEXT NOT NULL,
            status TEXT NOT NULL,
            overall_confidence REAL NOT NULL DEFAULT 0.0,
            extraction_failed INTEGER NOT NULL DEFAULT 0,
            promised_date TEXT,
            received_at TEXT NOT NULL,
            assembled_at TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_line_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS line_items (
            guid TEXT PRIMARY KEY,
            record_guid TEXT NOT NULL REFERENCES golden_records(guid),
            candidate_index INTEGER NOT NULL,
            description TEXT NOT NULL,
            quantity REAL NOT NULL,
            uom TEXT,
            unit_price REAL,
            extraction_confidence REAL NOT NULL,
            sku_id TEXT,
            match_score REAL NOT NULL DEFAULT 0.0,
            match_tier TEXT,
            composite REAL NOT NULL DEFAULT 0.0,
            decision TEXT NOT NULL,
            extractor TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Ranked runner-up matches kept for audit
async fn create_line_matches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS line_matches (
            line_guid TEXT NOT NULL REFERENCES line_items(guid),
            rank INTEGER NOT NULL,
            sku_id TEXT NOT NULL,
            score REAL NOT NULL,
            tier TEXT NOT NULL,
            PRIMARY KEY (line_guid, rank)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_line_validations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS line_validations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            line_guid TEXT NOT NULL REFERENCES line_items(guid),
            rule TEXT NOT NULL,
            status TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Append-only audit trail of pipeline, review, and sync activity
async fn create_audit_trail_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_trail (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_guid TEXT NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            detail TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Customer standing metadata consumed by validation rules
async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            customer_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            credit_hold INTEGER NOT NULL DEFAULT 0,
            ship_to_blocked INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
