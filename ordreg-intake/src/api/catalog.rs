//! Catalog administration endpoints

use crate::catalog;
use crate::error::ApiResult;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use ordreg_common::OrdregEvent;
use serde::Serialize;

/// Catalog reload response
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub entry_count: usize,
    pub version: u64,
}

/// POST /catalog/reload
///
/// Re-reads the catalog source and installs a fresh immutable index.
/// In-flight pipeline runs keep the snapshot they started with.
pub async fn reload_catalog(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let path = state.catalog_path.as_ref().ok_or_else(|| {
        crate::ApiError::Conflict("no catalog path configured; reload disabled".to_string())
    })?;

    let entries = catalog::load_entries(path)?;
    let version = state.catalog.install(entries).await;
    let entry_count = state.catalog.snapshot().await.active_count();

    state.event_bus.emit_lossy(OrdregEvent::CatalogReloaded {
        entry_count,
        version,
        timestamp: Utc::now(),
    });

    Ok(Json(ReloadResponse {
        entry_count,
        version,
    }))
}

/// Build catalog routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/catalog/reload", post(reload_catalog))
}
