//! Golden Record Assembler
//!
//! Combines the request header, extraction output, match results,
//! validation outcomes, and fusion verdicts into the final golden
//! record. Assembly is pure and deterministic given its inputs — no
//! hidden state — so the pipeline is replayable for testing and audit.

use crate::types::{Fused, LineCandidate, MatchTier, RoutingDecision, RuleOutcome, SkuMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Golden record lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Created, pipeline not yet complete
    Pending,
    /// At least one line (or the record itself) needs human review
    NeedsReview,
    /// Every line auto-accepted or review-approved
    Validated,
    /// Applied by the ERP sync layer (terminal)
    Synced,
    /// Rejected in review (terminal)
    Rejected,
}

impl RecordStatus {
    /// String form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::NeedsReview => "needs_review",
            RecordStatus::Validated => "validated",
            RecordStatus::Synced => "synced",
            RecordStatus::Rejected => "rejected",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordStatus::Pending),
            "needs_review" => Some(RecordStatus::NeedsReview),
            "validated" => Some(RecordStatus::Validated),
            "synced" => Some(RecordStatus::Synced),
            "rejected" => Some(RecordStatus::Rejected),
            _ => None,
        }
    }
}

/// Which pipeline stage produced each field of a line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// Extractor id/version ("pattern/1", "remote/1")
    pub extractor: String,
    /// Match tier that resolved the SKU (None when unmatched)
    pub match_tier: Option<String>,
    /// Rules evaluated against the line, in evaluation order
    pub rules: Vec<String>,
}

/// A finalized order line within a golden record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub line_id: Uuid,
    /// Index of the source candidate in the extractor output (trace link)
    pub candidate_index: usize,
    pub description: String,
    pub quantity: f64,
    pub uom: Option<String>,
    pub unit_price: Option<f64>,
    pub extraction_confidence: f64,
    /// Resolved SKU (None when no tier cleared its floor)
    pub sku_id: Option<String>,
    pub match_score: f64,
    pub match_tier: Option<MatchTier>,
    /// Ranked runner-up matches kept for audit
    pub runner_ups: Vec<SkuMatch>,
    pub validations: Vec<RuleOutcome>,
    pub composite: f64,
    pub decision: RoutingDecision,
    pub provenance: Provenance,
}

impl LineItem {
    /// Business-impact weight used for review queue ordering
    pub fn line_value(&self) -> f64 {
        self.unit_price.map_or(0.0, |p| p * self.quantity)
    }
}

/// The validated, provenance-tracked representation of a customer order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenRecord {
    pub record_id: Uuid,
    /// Human-facing order id, derived from the message fingerprint
    pub order_id: String,
    pub customer_id: String,
    pub channel: String,
    pub received_at: DateTime<Utc>,
    pub assembled_at: DateTime<Utc>,
    /// Requested delivery date, as stated upstream (free text)
    pub promised_date: Option<String>,
    pub status: RecordStatus,
    /// Minimum composite across lines (0.0 for a record with no lines)
    pub overall_confidence: f64,
    /// True when the extraction stage failed and yielded no candidates
    pub extraction_failed: bool,
    pub lines: Vec<LineItem>,
}

/// Per-candidate inputs to assembly
#[derive(Debug, Clone)]
pub struct LineAssembly {
    pub candidate: LineCandidate,
    /// Index into the extractor output this line traces to
    pub candidate_index: usize,
    /// Ranked matches; first entry is the retained top match
    pub matches: Vec<SkuMatch>,
    pub validations: Vec<RuleOutcome>,
    pub fused: Fused,
}

/// Structural invariant violations during assembly
///
/// These are defects, not routing outcomes: they abort assembly and are
/// surfaced to the caller, never auto-corrected.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Two line items claim the same source candidate
    #[error("Two line items claim candidate index {index}")]
    DuplicateCandidate { index: usize },
}

/// Request header inputs to assembly
#[derive(Debug, Clone)]
pub struct AssemblyHeader {
    pub record_id: Uuid,
    pub order_id: String,
    pub customer_id: String,
    pub channel: String,
    pub received_at: DateTime<Utc>,
    /// Requested delivery date, as stated upstream
    pub promised_date: Option<String>,
    /// Provenance tag of the extractor that produced the candidates
    /// ("pattern/1", "remote/1")
    pub extractor: String,
    pub extraction_failed: bool,
}

/// Assemble the golden record from per-stage outputs
///
/// Header status is `needs_review` when any line's fusion decision is
/// `needs_review`, or when there are no lines at all (nothing
/// recognizable was extracted — a human decides, the request never
/// vanishes). Otherwise `validated`.
pub fn assemble(
    header: AssemblyHeader,
    lines: Vec<LineAssembly>,
    assembled_at: DateTime<Utc>,
) -> Result<GoldenRecord, AssemblyError> {
    let mut seen = HashSet::new();
    for line in &lines {
        if !seen.insert(line.candidate_index) {
            return Err(AssemblyError::DuplicateCandidate {
                index: line.candidate_index,
            });
        }
    }

    let line_items: Vec<LineItem> = lines
        .into_iter()
        .map(|assembly| {
            let top = assembly.matches.first().cloned();
            let runner_ups = if assembly.matches.len() > 1 {
                assembly.matches[1..].to_vec()
            } else {
                Vec::new()
            };
            let rules = assembly
                .validations
                .iter()
                .map(|o| o.rule.clone())
                .collect();

            LineItem {
                line_id: Uuid::new_v4(),
                candidate_index: assembly.candidate_index,
                description: assembly.candidate.description,
                quantity: assembly.candidate.quantity,
                uom: assembly.candidate.uom,
                unit_price: assembly.candidate.unit_price,
                extraction_confidence: assembly.candidate.confidence,
                sku_id: top.as_ref().map(|m| m.sku_id.clone()),
                match_score: top.as_ref().map_or(0.0, |m| m.score),
                match_tier: top.as_ref().map(|m| m.tier),
                runner_ups,
                validations: assembly.validations,
                composite: assembly.fused.composite,
                decision: assembly.fused.decision,
                provenance: Provenance {
                    extractor: header.extractor.clone(),
                    match_tier: top.map(|m| m.tier.as_str().to_string()),
                    rules,
                },
            }
        })
        .collect();

    let needs_review = line_items.is_empty()
        || line_items
            .iter()
            .any(|l| l.decision == RoutingDecision::NeedsReview);

    let overall_confidence = line_items
        .iter()
        .map(|l| l.composite)
        .fold(f64::INFINITY, f64::min);
    let overall_confidence = if overall_confidence.is_finite() {
        overall_confidence
    } else {
        0.0
    };

    Ok(GoldenRecord {
        record_id: header.record_id,
        order_id: header.order_id,
        customer_id: header.customer_id,
        channel: header.channel,
        received_at: header.received_at,
        assembled_at,
        promised_date: header.promised_date,
        status: if needs_review {
            RecordStatus::NeedsReview
        } else {
            RecordStatus::Validated
        },
        overall_confidence,
        extraction_failed: header.extraction_failed,
        lines: line_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleOutcome;

    fn candidate(desc: &str) -> LineCandidate {
        LineCandidate {
            description: desc.to_string(),
            quantity: 2.0,
            uom: Some("each".to_string()),
            unit_price: None,
            confidence: 0.9,
        }
    }

    fn header() -> AssemblyHeader {
        AssemblyHeader {
            record_id: Uuid::new_v4(),
            order_id: "REQ-0011aabb".to_string(),
            customer_id: "CUST-1".to_string(),
            channel: "email".to_string(),
            received_at: Utc::now(),
            promised_date: None,
            extractor: "pattern/1".to_string(),
            extraction_failed: false,
        }
    }

    fn line(index: usize, decision: RoutingDecision, composite: f64) -> LineAssembly {
        LineAssembly {
            candidate: candidate("blue widget"),
            candidate_index: index,
            matches: vec![
                SkuMatch {
                    sku_id: "SKU-1".to_string(),
                    score: 1.0,
                    tier: MatchTier::Exact,
                },
                SkuMatch {
                    sku_id: "SKU-9".to_string(),
                    score: 0.7,
                    tier: MatchTier::Exact,
                },
            ],
            validations: vec![RuleOutcome::pass("missing_match", "matched SKU-1")],
            fused: Fused {
                composite,
                decision,
            },
        }
    }

    #[test]
    fn test_all_accepted_lines_validate_record() {
        let record = assemble(
            header(),
            vec![
                line(0, RoutingDecision::AutoAccept, 0.9),
                line(1, RoutingDecision::AutoAccept, 0.85),
            ],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(record.status, RecordStatus::Validated);
        assert_eq!(record.lines.len(), 2);
        // Overall confidence is the weakest line, not the average
        assert!((record.overall_confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_one_review_line_flips_record_status() {
        let record = assemble(
            header(),
            vec![
                line(0, RoutingDecision::AutoAccept, 0.9),
                line(1, RoutingDecision::NeedsReview, 0.3),
            ],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(record.status, RecordStatus::NeedsReview);
    }

    #[test]
    fn test_zero_lines_routes_to_review() {
        let record = assemble(header(), vec![], Utc::now()).unwrap();
        assert_eq!(record.status, RecordStatus::NeedsReview);
        assert_eq!(record.overall_confidence, 0.0);
        assert!(record.lines.is_empty());
    }

    #[test]
    fn test_top_match_retained_runner_ups_kept() {
        let record = assemble(
            header(),
            vec![line(0, RoutingDecision::AutoAccept, 0.9)],
            Utc::now(),
        )
        .unwrap();

        let item = &record.lines[0];
        assert_eq!(item.sku_id.as_deref(), Some("SKU-1"));
        assert_eq!(item.match_score, 1.0);
        assert_eq!(item.runner_ups.len(), 1);
        assert_eq!(item.runner_ups[0].sku_id, "SKU-9");
    }

    #[test]
    fn test_provenance_carries_stage_tags() {
        let record = assemble(
            header(),
            vec![line(0, RoutingDecision::AutoAccept, 0.9)],
            Utc::now(),
        )
        .unwrap();

        let provenance = &record.lines[0].provenance;
        assert_eq!(provenance.extractor, "pattern/1");
        assert_eq!(provenance.match_tier.as_deref(), Some("exact"));
        assert_eq!(provenance.rules, vec!["missing_match".to_string()]);
    }

    #[test]
    fn test_duplicate_candidate_claim_aborts() {
        let result = assemble(
            header(),
            vec![
                line(0, RoutingDecision::AutoAccept, 0.9),
                line(0, RoutingDecision::AutoAccept, 0.9),
            ],
            Utc::now(),
        );

        assert!(matches!(
            result,
            Err(AssemblyError::DuplicateCandidate { index: 0 })
        ));
    }

    #[test]
    fn test_assembly_is_deterministic_modulo_line_ids() {
        let hdr = header();
        let a = assemble(
            hdr.clone(),
            vec![line(0, RoutingDecision::AutoAccept, 0.9)],
            hdr.received_at,
        )
        .unwrap();
        let b = assemble(
            hdr.clone(),
            vec![line(0, RoutingDecision::AutoAccept, 0.9)],
            hdr.received_at,
        )
        .unwrap();

        assert_eq!(a.status, b.status);
        assert_eq!(a.overall_confidence, b.overall_confidence);
        assert_eq!(a.lines[0].sku_id, b.lines[0].sku_id);
        assert_eq!(a.lines[0].composite, b.lines[0].composite);
    }
}
