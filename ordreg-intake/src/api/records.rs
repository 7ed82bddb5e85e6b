//! Golden record endpoints
//!
//! Full record retrieval (with audit trail) plus the sync boundary:
//! snapshot emission and sync report recording.

use crate::assembler::GoldenRecord;
use crate::db;
use crate::error::ApiResult;
use crate::sync::{RecordSnapshot, SyncReport};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full record response: the golden record plus its audit trail
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    #[serde(flatten)]
    pub record: GoldenRecord,
    pub audit_trail: Vec<db::audit::AuditEntry>,
}

/// GET /records/:id
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<RecordResponse>> {
    let record = db::records::fetch_record(&state.db, record_id).await?;
    let audit_trail = db::audit::list(&state.db, record_id).await?;
    Ok(Json(RecordResponse {
        record,
        audit_trail,
    }))
}

/// POST /records/:id/sync — emit the immutable snapshot
pub async fn emit_sync_snapshot(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
) -> ApiResult<Json<RecordSnapshot>> {
    let snapshot = state.sync().emit_snapshot(record_id).await?;
    Ok(Json(snapshot))
}

/// POST /records/:id/sync/report — record the sync layer's outcome
pub async fn record_sync_report(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(report): Json<SyncReport>,
) -> ApiResult<Json<serde_json::Value>> {
    state.sync().record_report(record_id, report).await?;
    Ok(Json(serde_json::json!({ "recorded": true })))
}

/// Rejection request body
#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

/// POST /records/:id/reject — terminal rejection by a reviewer
pub async fn reject_record(
    State(state): State<AppState>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.review().reject_record(record_id, &body.reason).await?;
    Ok(Json(serde_json::json!({ "rejected": true })))
}

/// Build record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/records/:id", get(get_record))
        .route("/records/:id/sync", post(emit_sync_snapshot))
        .route("/records/:id/sync/report", post(record_sync_report))
        .route("/records/:id/reject", post(reject_record))
}
