//! Human-in-the-Loop Review
//!
//! Exposes lines with `needs_review` through a queue ordered by
//! ascending composite confidence, then by order value descending, and
//! applies reviewer decisions. A decision re-runs validation and fusion
//! for the affected line(s) only — matching is not re-run; `remap_sku`
//! exists for that — and appends to the audit trail.

use crate::assembler::{LineItem, RecordStatus};
use crate::catalog::CatalogHandle;
use crate::db;
use crate::fusion::ConfidenceFuser;
use crate::params::PipelineParams;
use crate::rules::{RuleContext, RuleEngine};
use crate::types::{
    LineCandidate, MatchTier, RoutingDecision, RuleStatus, SkuMatch,
};
use chrono::Utc;
use ordreg_common::{Error, EventBus, OrdregEvent, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub use crate::db::records::ReviewQueueEntry;

/// Reviewer decision payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Accept the line as assembled
    Approve,
    /// Correct one extracted field, then re-validate and re-fuse
    Correct { field: String, value: String },
    /// Re-point the line at a different SKU (human-asserted match)
    RemapSku { sku_id: String },
    /// Split the line into two half-quantity lines
    Split,
    /// Fold this line into a sibling line of the same record
    Merge { into_line: Uuid },
}

impl ReviewDecision {
    fn kind(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Correct { .. } => "correct",
            ReviewDecision::RemapSku { .. } => "remap_sku",
            ReviewDecision::Split => "split",
            ReviewDecision::Merge { .. } => "merge",
        }
    }
}

/// Review service
pub struct ReviewService {
    db: SqlitePool,
    catalog: Arc<CatalogHandle>,
    rules: RuleEngine,
    event_bus: EventBus,
}

impl ReviewService {
    pub fn new(db: SqlitePool, catalog: Arc<CatalogHandle>, event_bus: EventBus) -> Self {
        Self {
            db,
            catalog,
            rules: RuleEngine::with_default_rules(),
            event_bus,
        }
    }

    /// The review queue: weakest confidence first, then order value
    pub async fn queue(&self) -> Result<Vec<ReviewQueueEntry>> {
        db::records::review_queue(&self.db).await
    }

    /// Apply one reviewer decision to one line
    pub async fn apply_decision(
        &self,
        record_id: Uuid,
        line_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<()> {
        let record = db::records::fetch_record(&self.db, record_id).await?;
        if matches!(record.status, RecordStatus::Synced | RecordStatus::Rejected) {
            return Err(Error::InvalidInput(format!(
                "record {} is terminal ({})",
                record_id,
                record.status.as_str()
            )));
        }

        let (owner, mut line) = db::records::fetch_line(&self.db, line_id).await?;
        if owner != record_id {
            return Err(Error::InvalidInput(format!(
                "line {} does not belong to record {}",
                line_id, record_id
            )));
        }

        let detail = json!({
            "decision": decision.kind(),
            "payload": serde_json::to_value(&decision)
                .map_err(|e| Error::Internal(format!("Serialize decision failed: {}", e)))?,
        });

        match decision {
            ReviewDecision::Approve => {
                // Fail closed: an approval cannot override a block
                if line
                    .validations
                    .iter()
                    .any(|o| o.status == RuleStatus::Block)
                {
                    return Err(Error::InvalidInput(
                        "line holds a blocking validation; correct or remap it instead".to_string(),
                    ));
                }
                line.decision = RoutingDecision::AutoAccept;
                db::records::update_line(&self.db, &line).await?;
            }
            ReviewDecision::Correct { field, value } => {
                apply_correction(&mut line, &field, &value)?;
                self.revalidate(&record.customer_id, &mut line).await?;
                db::records::update_line(&self.db, &line).await?;
            }
            ReviewDecision::RemapSku { sku_id } => {
                let catalog = self.catalog.snapshot().await;
                if catalog.get(&sku_id).is_none() {
                    return Err(Error::InvalidInput(format!("unknown SKU '{}'", sku_id)));
                }
                // Human-asserted match: tier manual, full score
                line.sku_id = Some(sku_id);
                line.match_score = 1.0;
                line.match_tier = Some(MatchTier::Manual);
                self.revalidate(&record.customer_id, &mut line).await?;
                db::records::update_line(&self.db, &line).await?;
            }
            ReviewDecision::Split => {
                let half = line.quantity / 2.0;
                let mut sibling = line.clone();
                sibling.line_id = Uuid::new_v4();
                sibling.quantity = line.quantity - half;
                line.quantity = half;

                self.revalidate(&record.customer_id, &mut line).await?;
                self.revalidate(&record.customer_id, &mut sibling).await?;
                db::records::update_line(&self.db, &line).await?;
                db::records::insert_line(&self.db, record_id, &sibling).await?;
            }
            ReviewDecision::Merge { into_line } => {
                if into_line == line_id {
                    return Err(Error::InvalidInput(
                        "cannot merge a line into itself".to_string(),
                    ));
                }
                let (target_owner, mut target) =
                    db::records::fetch_line(&self.db, into_line).await?;
                if target_owner != record_id {
                    return Err(Error::InvalidInput(format!(
                        "merge target {} belongs to a different record",
                        into_line
                    )));
                }

                target.quantity += line.quantity;
                self.revalidate(&record.customer_id, &mut target).await?;
                db::records::update_line(&self.db, &target).await?;
                db::records::delete_line(&self.db, line_id).await?;
            }
        }

        self.recompute_record(record_id).await?;
        db::audit::append(&self.db, record_id, "reviewer", "decision_applied", &detail).await?;

        self.event_bus.emit_lossy(OrdregEvent::DecisionApplied {
            record_id,
            line_id,
            decision: detail["decision"].as_str().unwrap_or("unknown").to_string(),
            timestamp: Utc::now(),
        });

        info!(record_id = %record_id, line_id = %line_id, "Review decision applied");
        Ok(())
    }

    /// Reject the whole record (terminal)
    pub async fn reject_record(&self, record_id: Uuid, reason: &str) -> Result<()> {
        let record = db::records::fetch_record(&self.db, record_id).await?;
        if record.status == RecordStatus::Synced {
            return Err(Error::InvalidInput(
                "record already synced; cannot reject".to_string(),
            ));
        }

        db::records::update_record_header(
            &self.db,
            record_id,
            RecordStatus::Rejected,
            record.overall_confidence,
        )
        .await?;
        db::audit::append(
            &self.db,
            record_id,
            "reviewer",
            "rejected",
            &json!({ "reason": reason }),
        )
        .await?;
        Ok(())
    }

    /// Re-run rules + fusion for one line (matching untouched)
    async fn revalidate(&self, customer_id: &str, line: &mut LineItem) -> Result<()> {
        let catalog = self.catalog.snapshot().await;
        let params = PipelineParams::load(&self.db).await?;
        let fuser = ConfidenceFuser::with_params(params.fusion);
        let customer = db::customers::get_customer(&self.db, customer_id).await?;

        let candidate = LineCandidate {
            description: line.description.clone(),
            quantity: line.quantity,
            uom: line.uom.clone(),
            unit_price: line.unit_price,
            confidence: line.extraction_confidence,
        };
        let top_match = line.sku_id.as_ref().map(|sku_id| SkuMatch {
            sku_id: sku_id.clone(),
            score: line.match_score,
            tier: line.match_tier.unwrap_or(MatchTier::Manual),
        });
        let entry = top_match
            .as_ref()
            .and_then(|m| catalog.get(&m.sku_id));

        line.validations = self.rules.validate(&RuleContext {
            candidate: &candidate,
            top_match: top_match.as_ref(),
            entry,
            customer: &customer,
        });

        let fused = fuser.fuse(line.extraction_confidence, line.match_score, &line.validations);
        line.composite = fused.composite;
        line.decision = fused.decision;
        line.provenance.match_tier = line.match_tier.map(|t| t.as_str().to_string());
        line.provenance.rules = line.validations.iter().map(|o| o.rule.clone()).collect();
        Ok(())
    }

    /// Recompute header status and overall confidence from current lines
    async fn recompute_record(&self, record_id: Uuid) -> Result<()> {
        let record = db::records::fetch_record(&self.db, record_id).await?;

        let needs_review = record.lines.is_empty()
            || record
                .lines
                .iter()
                .any(|l| l.decision == RoutingDecision::NeedsReview);

        let overall = record
            .lines
            .iter()
            .map(|l| l.composite)
            .fold(f64::INFINITY, f64::min);
        let overall = if overall.is_finite() { overall } else { 0.0 };

        let status = if needs_review {
            RecordStatus::NeedsReview
        } else {
            RecordStatus::Validated
        };

        db::records::update_record_header(&self.db, record_id, status, overall).await
    }
}

/// Apply a field correction to a line
fn apply_correction(line: &mut LineItem, field: &str, value: &str) -> Result<()> {
    match field {
        "description" => {
            line.description = value.to_string();
        }
        "quantity" => {
            let quantity: f64 = value
                .parse()
                .map_err(|_| Error::InvalidInput(format!("invalid quantity '{}'", value)))?;
            if quantity <= 0.0 {
                return Err(Error::InvalidInput("quantity must be positive".to_string()));
            }
            line.quantity = quantity;
        }
        "uom" => {
            line.uom = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        "unit_price" => {
            line.unit_price = if value.is_empty() {
                None
            } else {
                Some(value.parse().map_err(|_| {
                    Error::InvalidInput(format!("invalid unit price '{}'", value))
                })?)
            };
        }
        other => {
            return Err(Error::InvalidInput(format!(
                "field '{}' is not correctable",
                other
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_payload_wire_format() {
        let json = r#"{"action": "remap_sku", "sku_id": "SKU-42"}"#;
        let decision: ReviewDecision = serde_json::from_str(json).unwrap();
        assert!(matches!(
            decision,
            ReviewDecision::RemapSku { ref sku_id } if sku_id == "SKU-42"
        ));

        let json = r#"{"action": "correct", "field": "quantity", "value": "5"}"#;
        let decision: ReviewDecision = serde_json::from_str(json).unwrap();
        assert_eq!(decision.kind(), "correct");

        let json = r#"{"action": "approve"}"#;
        let decision: ReviewDecision = serde_json::from_str(json).unwrap();
        assert_eq!(decision.kind(), "approve");
    }

    #[test]
    fn test_correction_rejects_unknown_field() {
        let mut line = sample_line();
        assert!(apply_correction(&mut line, "customer_id", "CUST-2").is_err());
    }

    #[test]
    fn test_correction_parses_typed_fields() {
        let mut line = sample_line();
        apply_correction(&mut line, "quantity", "7.5").unwrap();
        assert_eq!(line.quantity, 7.5);

        apply_correction(&mut line, "unit_price", "4.25").unwrap();
        assert_eq!(line.unit_price, Some(4.25));

        apply_correction(&mut line, "uom", "").unwrap();
        assert!(line.uom.is_none());

        assert!(apply_correction(&mut line, "quantity", "-1").is_err());
    }

    fn sample_line() -> LineItem {
        use crate::assembler::Provenance;
        LineItem {
            line_id: Uuid::new_v4(),
            candidate_index: 0,
            description: "blue widget".to_string(),
            quantity: 2.0,
            uom: Some("each".to_string()),
            unit_price: None,
            extraction_confidence: 0.9,
            sku_id: Some("SKU-1".to_string()),
            match_score: 1.0,
            match_tier: Some(MatchTier::Exact),
            runner_ups: vec![],
            validations: vec![],
            composite: 0.9,
            decision: RoutingDecision::AutoAccept,
            provenance: Provenance {
                extractor: "pattern/1".to_string(),
                match_tier: Some("exact".to_string()),
                rules: vec![],
            },
        }
    }
}
