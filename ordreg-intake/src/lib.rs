//! ordreg-intake library interface
//!
//! The Order Intake service: ingests unstructured order messages and
//! converts them into normalized, auditable golden records with line
//! items resolved to canonical SKUs, per-field confidence, and routing
//! decisions. Exposed as a library for integration testing and the demo
//! binary.

pub mod api;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fusion;
pub mod ledger;
pub mod matcher;
pub mod params;
pub mod pipeline;
pub mod review;
pub mod rules;
pub mod sync;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use crate::catalog::CatalogHandle;
use crate::pipeline::IntakePipeline;
use crate::review::ReviewService;
use crate::sync::SyncService;
use crate::types::CandidateExtractor;
use axum::Router;
use chrono::{DateTime, Utc};
use ordreg_common::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Current catalog index (hot-reloadable snapshot handle)
    pub catalog: Arc<CatalogHandle>,
    /// Active candidate extractor
    pub extractor: Arc<dyn CandidateExtractor>,
    /// Catalog source path for reloads (None = reload disabled)
    pub catalog_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        catalog: Arc<CatalogHandle>,
        extractor: Arc<dyn CandidateExtractor>,
        catalog_path: Option<PathBuf>,
    ) -> Self {
        Self {
            db,
            event_bus,
            catalog,
            extractor,
            catalog_path,
            startup_time: Utc::now(),
        }
    }

    /// Pipeline instance over this state
    pub fn pipeline(&self) -> IntakePipeline {
        IntakePipeline::new(
            self.db.clone(),
            self.extractor.clone(),
            self.catalog.clone(),
            self.event_bus.clone(),
        )
    }

    /// Review service instance over this state
    pub fn review(&self) -> ReviewService {
        ReviewService::new(self.db.clone(), self.catalog.clone(), self.event_bus.clone())
    }

    /// Sync service instance over this state
    pub fn sync(&self) -> SyncService {
        SyncService::new(self.db.clone(), self.event_bus.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::intake_routes())
        .merge(api::record_routes())
        .merge(api::review_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
