//! Customer metadata queries

use crate::types::CustomerProfile;
use ordreg_common::Result;
use sqlx::SqlitePool;

/// Load the standing profile for a customer
///
/// A customer with no stored metadata gets an unrestricted profile —
/// absence of metadata is not a block condition.
pub async fn get_customer(pool: &SqlitePool, customer_id: &str) -> Result<CustomerProfile> {
    let row: Option<(String, String, i64, i64)> = sqlx::query_as(
        "SELECT customer_id, name, credit_hold, ship_to_blocked FROM customers WHERE customer_id = ?",
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some((customer_id, name, credit_hold, ship_to_blocked)) => CustomerProfile {
            customer_id,
            name,
            credit_hold: credit_hold != 0,
            ship_to_blocked: ship_to_blocked != 0,
        },
        None => CustomerProfile::unrestricted(customer_id),
    })
}

/// Insert or update a customer profile
pub async fn upsert_customer(pool: &SqlitePool, profile: &CustomerProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (customer_id, name, credit_hold, ship_to_blocked)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(customer_id) DO UPDATE SET
            name = excluded.name,
            credit_hold = excluded.credit_hold,
            ship_to_blocked = excluded.ship_to_blocked,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&profile.customer_id)
    .bind(&profile.name)
    .bind(profile.credit_hold as i64)
    .bind(profile.ship_to_blocked as i64)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_unknown_customer_is_unrestricted() {
        let pool = init_memory_pool().await.unwrap();
        let profile = get_customer(&pool, "CUST-UNKNOWN").await.unwrap();

        assert_eq!(profile.customer_id, "CUST-UNKNOWN");
        assert!(!profile.credit_hold);
        assert!(!profile.ship_to_blocked);
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let profile = CustomerProfile {
            customer_id: "CUST-1".to_string(),
            name: "Acme Steel".to_string(),
            credit_hold: true,
            ship_to_blocked: false,
        };
        upsert_customer(&pool, &profile).await.unwrap();

        let loaded = get_customer(&pool, "CUST-1").await.unwrap();
        assert_eq!(loaded.name, "Acme Steel");
        assert!(loaded.credit_hold);
        assert!(!loaded.ship_to_blocked);
    }
}
