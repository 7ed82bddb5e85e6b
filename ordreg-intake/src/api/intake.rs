//! Intake endpoint
//!
//! POST /intake runs the full pipeline for one inbound message. A
//! duplicate delivery is a 200 with `duplicate: true` — not an error;
//! webhook retries must succeed quietly.

use crate::error::ApiResult;
use crate::ledger::InboundRequest;
use crate::pipeline::IntakeOutcome;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Intake request body
#[derive(Debug, Deserialize)]
pub struct IntakeBody {
    pub customer_id: String,
    pub channel: String,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Requested delivery date, when the channel carries one
    #[serde(default)]
    pub promised_date: Option<String>,
}

/// Intake response
#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    pub record_id: Uuid,
    /// Status of the (possibly pre-existing) golden record
    pub status: Option<String>,
    pub duplicate: bool,
    pub line_count: usize,
}

/// POST /intake
pub async fn intake(
    State(state): State<AppState>,
    Json(body): Json<IntakeBody>,
) -> ApiResult<Json<IntakeResponse>> {
    if body.customer_id.trim().is_empty() || body.channel.trim().is_empty() {
        return Err(crate::ApiError::BadRequest(
            "customer_id and channel are required".to_string(),
        ));
    }

    let outcome = state
        .pipeline()
        .process(InboundRequest {
            customer_id: body.customer_id,
            channel: body.channel,
            text: body.text,
            attachments: body.attachments,
            promised_date: body.promised_date,
            received_at: Utc::now(),
        })
        .await?;

    Ok(Json(match outcome {
        IntakeOutcome::Duplicate { prior_record_id } => IntakeResponse {
            record_id: prior_record_id,
            status: None,
            duplicate: true,
            line_count: 0,
        },
        IntakeOutcome::Processed {
            record_id,
            status,
            line_count,
            ..
        } => IntakeResponse {
            record_id,
            status: Some(status.as_str().to_string()),
            duplicate: false,
            line_count,
        },
    }))
}

/// Build intake routes
pub fn intake_routes() -> Router<AppState> {
    Router::new().route("/intake", post(intake))
}
