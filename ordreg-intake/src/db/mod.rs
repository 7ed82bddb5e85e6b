//! Database access for the intake service

pub mod audit;
pub mod customers;
pub mod records;
pub mod schema;

use ordreg_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the intake service database (pool + schema)
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = ordreg_common::db::init_database(db_path).await?;
    schema::create_all_tables(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full intake schema (tests, demo)
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = ordreg_common::db::init::init_memory_database().await?;
    schema::create_all_tables(&pool).await?;
    Ok(pool)
}
