//! Review queue endpoints

use crate::db::records::ReviewQueueEntry;
use crate::error::ApiResult;
use crate::review::ReviewDecision;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

/// GET /review/queue
///
/// Lines awaiting review, ordered by ascending composite confidence,
/// then order value descending.
pub async fn review_queue(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ReviewQueueEntry>>> {
    Ok(Json(state.review().queue().await?))
}

/// POST /review/:record_id/lines/:line_id/decision
pub async fn apply_decision(
    State(state): State<AppState>,
    Path((record_id, line_id)): Path<(Uuid, Uuid)>,
    Json(decision): Json<ReviewDecision>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .review()
        .apply_decision(record_id, line_id, decision)
        .await?;
    Ok(Json(serde_json::json!({ "applied": true })))
}

/// Build review routes
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/review/queue", get(review_queue))
        .route("/review/:record_id/lines/:line_id/decision", post(apply_decision))
}
