//! Audit trail queries
//!
//! The audit trail is append-only: pipeline stages, reviewer decisions,
//! and sync reports append entries; nothing updates or deletes them.

use ordreg_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// One audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub record_id: Uuid,
    /// Who acted ("pipeline", "reviewer", "erp_sync")
    pub actor: String,
    /// What happened ("assembled", "decision_applied", "sync_reported")
    pub action: String,
    /// Structured detail payload (JSON)
    pub detail: serde_json::Value,
    pub created_at: String,
}

/// Append an entry to a record's audit trail
pub async fn append(
    pool: &SqlitePool,
    record_id: Uuid,
    actor: &str,
    action: &str,
    detail: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_trail (record_guid, actor, action, detail) VALUES (?, ?, ?, ?)",
    )
    .bind(record_id.to_string())
    .bind(actor)
    .bind(action)
    .bind(detail.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// List a record's audit trail in append order
pub async fn list(pool: &SqlitePool, record_id: Uuid) -> Result<Vec<AuditEntry>> {
    let rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
        "SELECT id, actor, action, detail, created_at FROM audit_trail
         WHERE record_guid = ? ORDER BY id ASC",
    )
    .bind(record_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, actor, action, detail, created_at)| AuditEntry {
            id,
            record_id,
            actor,
            action,
            detail: serde_json::from_str(&detail).unwrap_or(serde_json::Value::Null),
            created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let pool = init_memory_pool().await.unwrap();
        let record_id = Uuid::new_v4();

        append(&pool, record_id, "pipeline", "assembled", &json!({"lines": 2}))
            .await
            .unwrap();
        append(
            &pool,
            record_id,
            "reviewer",
            "decision_applied",
            &json!({"decision": "approve"}),
        )
        .await
        .unwrap();

        let entries = list(&pool, record_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "assembled");
        assert_eq!(entries[1].action, "decision_applied");
        assert_eq!(entries[1].detail["decision"], "approve");
    }

    #[tokio::test]
    async fn test_trails_are_per_record() {
        let pool = init_memory_pool().await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        append(&pool, a, "pipeline", "assembled", &json!({})).await.unwrap();
        append(&pool, b, "pipeline", "assembled", &json!({})).await.unwrap();

        assert_eq!(list(&pool, a).await.unwrap().len(), 1);
        assert_eq!(list(&pool, b).await.unwrap().len(), 1);
    }
}
