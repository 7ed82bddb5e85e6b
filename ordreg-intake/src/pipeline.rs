//! Intake Pipeline Orchestrator
//!
//! Runs one inbound request through the full pipeline:
//! admit → extract → per-candidate match + validate → fuse → assemble →
//! persist, emitting events along the way.
//!
//! Error discipline: stage-local recoverable conditions (duplicate
//! request, unreachable extraction service, no catalog match, low
//! confidence) become data — routing outcomes, validation results —
//! never propagated errors. Only structural invariant violations and
//! infrastructure failures surface as `Err`. A request that cannot be
//! fully processed still yields a golden record in `needs_review`;
//! requests are never dropped.

use crate::assembler::{self, AssemblyHeader, GoldenRecord, LineAssembly, RecordStatus};
use crate::catalog::{CatalogHandle, CatalogIndex};
use crate::db;
use crate::fusion::ConfidenceFuser;
use crate::ledger::{Admission, InboundRequest, IntakeLedger};
use crate::matcher::SkuMatcher;
use crate::params::PipelineParams;
use crate::rules::{RuleContext, RuleEngine};
use crate::types::{CandidateExtractor, ExtractionError, RoutingDecision};
use chrono::Utc;
use ordreg_common::{Error, EventBus, OrdregEvent, Result};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of processing one inbound request
#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    /// The request repeats an earlier one; nothing was processed
    Duplicate { prior_record_id: Uuid },
    /// A golden record was created
    Processed {
        record_id: Uuid,
        order_id: String,
        status: RecordStatus,
        line_count: usize,
    },
}

/// Intake Pipeline
///
/// One instance serves all requests; per-request state lives on the
/// stack of `process`. Requests for different dedup keys run fully in
/// parallel; same-key requests serialize through the ledger's atomic
/// admit.
pub struct IntakePipeline {
    db: SqlitePool,
    ledger: IntakeLedger,
    extractor: Arc<dyn CandidateExtractor>,
    catalog: Arc<CatalogHandle>,
    rules: RuleEngine,
    event_bus: EventBus,
}

impl IntakePipeline {
    pub fn new(
        db: SqlitePool,
        extractor: Arc<dyn CandidateExtractor>,
        catalog: Arc<CatalogHandle>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            ledger: IntakeLedger::new(db.clone()),
            db,
            extractor,
            catalog,
            rules: RuleEngine::with_default_rules(),
            event_bus,
        }
    }

    /// Process one inbound request end to end
    pub async fn process(&self, request: InboundRequest) -> Result<IntakeOutcome> {
        // Stage 1: dedup gate
        let (record_id, order_id) = match self.ledger.admit(&request).await? {
            Admission::Duplicate { prior_record_id } => {
                self.event_bus.emit_lossy(OrdregEvent::DuplicateSuppressed {
                    prior_record_id,
                    customer_id: request.customer_id.clone(),
                    timestamp: Utc::now(),
                });
                return Ok(IntakeOutcome::Duplicate { prior_record_id });
            }
            Admission::Accepted {
                record_id,
                order_id,
            } => (record_id, order_id),
        };

        self.event_bus.emit_lossy(OrdregEvent::RequestAdmitted {
            record_id,
            customer_id: request.customer_id.clone(),
            channel: request.channel.clone(),
            timestamp: Utc::now(),
        });

        // Stage 2: candidate extraction (the only suspension point that
        // may fail without corrupting ledger or catalog state)
        let (candidates, extraction_failed) = match self
            .extractor
            .extract(&request.text, &request.attachments)
            .await
        {
            Ok(candidates) => (candidates, false),
            Err(ExtractionError::Unavailable(msg)) => {
                warn!(record_id = %record_id, error = %msg, "Extraction unavailable, routing to review");
                (Vec::new(), true)
            }
            Err(ExtractionError::Malformed(msg)) => {
                warn!(record_id = %record_id, error = %msg, "Extraction response malformed, routing to review");
                (Vec::new(), true)
            }
        };

        // Stage 3+4: match and validate each candidate against one
        // catalog snapshot; a mid-run reload cannot tear the view
        let catalog = self.catalog.snapshot().await;
        let params = PipelineParams::load(&self.db).await?;
        let matcher = SkuMatcher::with_floors(params.floors);
        let fuser = ConfidenceFuser::with_params(params.fusion);
        let customer = db::customers::get_customer(&self.db, &request.customer_id).await?;

        let mut assemblies = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.into_iter().enumerate() {
            let matches = matcher.lookup(&catalog, &candidate.description);
            let top = matches.first();
            let entry = top.and_then(|m| catalog.get(&m.sku_id));

            let outcomes = self.rules.validate(&RuleContext {
                candidate: &candidate,
                top_match: top,
                entry,
                customer: &customer,
            });

            // Stage 5: fuse signals into the routing decision
            let fused = fuser.fuse(
                candidate.confidence,
                top.map_or(0.0, |m| m.score),
                &outcomes,
            );

            debug!(
                record_id = %record_id,
                candidate = index,
                sku = top.map(|m| m.sku_id.as_str()).unwrap_or("<none>"),
                composite = fused.composite,
                decision = fused.decision.as_str(),
                "Candidate resolved"
            );

            assemblies.push(LineAssembly {
                candidate,
                candidate_index: index,
                matches,
                validations: outcomes,
                fused,
            });
        }

        // Stage 6: assemble and persist
        let record = assembler::assemble(
            AssemblyHeader {
                record_id,
                order_id: order_id.clone(),
                customer_id: request.customer_id.clone(),
                channel: request.channel.clone(),
                received_at: request.received_at,
                promised_date: request.promised_date.clone(),
                extractor: format!("{}/{}", self.extractor.id(), self.extractor.version()),
                extraction_failed,
            },
            assemblies,
            Utc::now(),
        )
        .map_err(|e| Error::Internal(format!("Assembly invariant violation: {}", e)))?;

        self.persist(&record, &catalog).await?;

        info!(
            record_id = %record_id,
            order_id = %order_id,
            status = record.status.as_str(),
            lines = record.lines.len(),
            "Golden record assembled"
        );

        Ok(IntakeOutcome::Processed {
            record_id,
            order_id,
            status: record.status,
            line_count: record.lines.len(),
        })
    }

    async fn persist(&self, record: &GoldenRecord, catalog: &CatalogIndex) -> Result<()> {
        db::records::persist_record(&self.db, record).await?;

        db::audit::append(
            &self.db,
            record.record_id,
            "pipeline",
            "assembled",
            &json!({
                "order_id": record.order_id,
                "status": record.status.as_str(),
                "line_count": record.lines.len(),
                "overall_confidence": record.overall_confidence,
                "extraction_failed": record.extraction_failed,
                "catalog_version": catalog.version(),
            }),
        )
        .await?;

        self.event_bus.emit_lossy(OrdregEvent::RecordAssembled {
            record_id: record.record_id,
            status: record.status.as_str().to_string(),
            line_count: record.lines.len(),
            overall_confidence: record.overall_confidence,
            timestamp: Utc::now(),
        });

        for line in &record.lines {
            if line.decision == RoutingDecision::NeedsReview {
                self.event_bus.emit_lossy(OrdregEvent::LineNeedsReview {
                    record_id: record.record_id,
                    line_id: line.line_id,
                    composite: line.composite,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(())
    }
}
