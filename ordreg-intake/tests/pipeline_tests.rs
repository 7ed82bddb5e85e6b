//! Pipeline Integration Tests
//!
//! End-to-end runs of the intake pipeline over an in-memory database
//! and a small test catalog: dedup idempotence, the matching scenarios,
//! validation routing, extraction failure handling, and the no-drop
//! guarantee.

use chrono::Utc;
use ordreg_common::events::EventBus;
use std::sync::Arc;

use ordreg_intake::assembler::RecordStatus;
use ordreg_intake::catalog::{parse_entries, CatalogHandle, CatalogIndex};
use ordreg_intake::db;
use ordreg_intake::extract::PatternExtractor;
use ordreg_intake::ledger::InboundRequest;
use ordreg_intake::pipeline::{IntakeOutcome, IntakePipeline};
use ordreg_intake::types::{
    CandidateExtractor, CustomerProfile, ExtractionError, LineCandidate, MatchTier,
    RoutingDecision, RuleStatus,
};

const TEST_CATALOG: &str = r#"[
    {
        "sku_id": "PVC-2IN",
        "name": "pvc pipe 2in",
        "synonyms": ["2\" pvc", "pvc 2in"],
        "permitted_uoms": ["each", "m"],
        "price_band": { "min": 3.0, "max": 6.0 }
    },
    {
        "sku_id": "CU-15",
        "name": "copper cable 1.5mm",
        "synonyms": ["1.5mm wire", "copper cable 1.5"],
        "permitted_uoms": ["m", "roll"],
        "price_band": { "min": 0.4, "max": 1.2 }
    },
    {
        "sku_id": "SW-8P",
        "name": "8 port switch",
        "synonyms": ["8p switch"],
        "permitted_uoms": ["each"],
        "price_band": { "min": 18.0, "max": 35.0 }
    },
    {
        "sku_id": "WID-BLUE",
        "name": "widget deluxe",
        "synonyms": ["widget, blue"],
        "permitted_uoms": ["each"],
        "price_band": { "min": 1.0, "max": 10.0 }
    }
]"#;

/// Test fixture: pipeline over in-memory DB and the test catalog
async fn fixture() -> (sqlx::SqlitePool, IntakePipeline) {
    let pool = db::init_memory_pool().await.unwrap();
    let catalog = Arc::new(CatalogHandle::new(CatalogIndex::build(
        parse_entries(TEST_CATALOG).unwrap(),
        1,
    )));
    let pipeline = IntakePipeline::new(
        pool.clone(),
        Arc::new(PatternExtractor::new()),
        catalog,
        EventBus::new(100),
    );
    (pool, pipeline)
}

fn request(customer: &str, channel: &str, text: &str) -> InboundRequest {
    InboundRequest {
        customer_id: customer.to_string(),
        channel: channel.to_string(),
        text: text.to_string(),
        attachments: vec![],
        promised_date: None,
        received_at: Utc::now(),
    }
}

async fn process_ok(
    pipeline: &IntakePipeline,
    customer: &str,
    channel: &str,
    text: &str,
) -> (uuid::Uuid, RecordStatus, usize) {
    match pipeline
        .process(request(customer, channel, text))
        .await
        .unwrap()
    {
        IntakeOutcome::Processed {
            record_id,
            status,
            line_count,
            ..
        } => (record_id, status, line_count),
        other => panic!("Expected Processed, got {:?}", other),
    }
}

// ============================================================================
// Matching scenarios
// ============================================================================

/// Exact canonical-name match scores 1.0 on the exact tier
#[tokio::test]
async fn test_exact_canonical_match() {
    let (pool, pipeline) = fixture().await;

    let (record_id, status, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "2x pvc pipe 2in").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert_eq!(line.sku_id.as_deref(), Some("PVC-2IN"));
    assert_eq!(line.match_score, 1.0);
    assert_eq!(line.match_tier, Some(MatchTier::Exact));
    assert_eq!(line.quantity, 2.0);
    assert_eq!(status, RecordStatus::Validated);
}

/// "5 x blue widget" against synonym "widget, blue" resolves on the
/// synonym tier with full token overlap and parsed quantity 5
#[tokio::test]
async fn test_synonym_tier_reordered_tokens() {
    let (pool, pipeline) = fixture().await;

    let (record_id, _, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "5 x blue widget").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert_eq!(line.sku_id.as_deref(), Some("WID-BLUE"));
    assert_eq!(line.match_tier, Some(MatchTier::Synonym));
    assert!(line.match_score >= 0.5);
    assert_eq!(line.quantity, 5.0);
}

/// Typos heavy enough to sink token overlap still resolve on the
/// fuzzy (edit distance) tier
#[tokio::test]
async fn test_fuzzy_tier_typo() {
    let (pool, pipeline) = fixture().await;

    // "pcv pip 2in": only "2in" survives as a shared token (overlap
    // 1/5, under the synonym floor), but edit distance is small
    let (record_id, _, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "2x pcv pip 2in").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert_eq!(line.sku_id.as_deref(), Some("PVC-2IN"));
    assert_eq!(line.match_tier, Some(MatchTier::Fuzzy));
}

/// An unmatchable description yields an unmatched line with a
/// missing_match block, not a dropped line or a fake match
#[tokio::test]
async fn test_no_match_blocks_line() {
    let (pool, pipeline) = fixture().await;

    let (record_id, status, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "3x industrial espresso machine").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert!(line.sku_id.is_none());
    assert_eq!(line.composite, 0.0);
    assert_eq!(line.decision, RoutingDecision::NeedsReview);
    assert!(line
        .validations
        .iter()
        .any(|o| o.rule == "missing_match" && o.status == RuleStatus::Block));
    assert_eq!(status, RecordStatus::NeedsReview);
}

// ============================================================================
// Validation routing
// ============================================================================

/// A UOM outside the permitted set blocks the line and forces review
/// regardless of a perfect match score
#[tokio::test]
async fn test_illegal_uom_forces_review() {
    let (pool, pipeline) = fixture().await;

    // "8p switch" matches SW-8P exactly, but it only sells by the each
    let (record_id, status, _) =
        process_ok(&pipeline, "Bright Energy", "email", "3 box 8p switch").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert_eq!(line.sku_id.as_deref(), Some("SW-8P"));
    assert_eq!(line.match_score, 1.0);
    assert_eq!(line.composite, 0.0);
    assert_eq!(line.decision, RoutingDecision::NeedsReview);
    assert_eq!(status, RecordStatus::NeedsReview);
}

/// A customer on credit hold blocks every line of the record
#[tokio::test]
async fn test_credit_hold_blocks_record() {
    let (pool, pipeline) = fixture().await;

    db::customers::upsert_customer(
        &pool,
        &CustomerProfile {
            customer_id: "Deadbeat Inc".to_string(),
            name: "Deadbeat Inc".to_string(),
            credit_hold: true,
            ship_to_blocked: false,
        },
    )
    .await
    .unwrap();

    let (record_id, status, _) =
        process_ok(&pipeline, "Deadbeat Inc", "email", "2x pvc pipe 2in").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    assert_eq!(status, RecordStatus::NeedsReview);
    assert!(record.lines[0]
        .validations
        .iter()
        .any(|o| o.rule == "customer_standing" && o.status == RuleStatus::Block));
}

/// A price slightly outside the band warns and reduces the composite
/// without blocking
#[tokio::test]
async fn test_price_drift_warns() {
    let (pool, pipeline) = fixture().await;

    // Band max 6.0; 6.50 is ~8% over → warn
    let (record_id, _, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "2x pvc pipe 2in @ 6.50").await;

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert!(line
        .validations
        .iter()
        .any(|o| o.rule == "price_band" && o.status == RuleStatus::Warn));
    // min(0.9, 1.0) - 0.1 warn penalty
    assert!((line.composite - 0.8).abs() < 1e-9);
    assert_eq!(line.decision, RoutingDecision::AutoAccept);
}

// ============================================================================
// Dedup / idempotence
// ============================================================================

/// Two deliveries with identical normalized text admit exactly once
#[tokio::test]
async fn test_duplicate_delivery_suppressed() {
    let (pool, pipeline) = fixture().await;

    let (first_id, _, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "Need 2x PVC pipe 2in").await;

    // Same message, rewrapped whitespace and case
    let outcome = pipeline
        .process(request("Acme Steel", "line_oa", "need   2x pvc pipe 2in"))
        .await
        .unwrap();

    match outcome {
        IntakeOutcome::Duplicate { prior_record_id } => {
            assert_eq!(prior_record_id, first_id);
        }
        other => panic!("Expected Duplicate, got {:?}", other),
    }

    // Exactly one golden record exists
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM golden_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ============================================================================
// Extraction failure / no-drop
// ============================================================================

/// Extractor stub that simulates an unreachable extraction service
struct UnavailableExtractor;

#[async_trait::async_trait]
impl CandidateExtractor for UnavailableExtractor {
    fn id(&self) -> &'static str {
        "remote"
    }
    fn version(&self) -> &'static str {
        "1"
    }
    async fn extract(
        &self,
        _text: &str,
        _attachments: &[String],
    ) -> Result<Vec<LineCandidate>, ExtractionError> {
        Err(ExtractionError::Unavailable("connection refused".to_string()))
    }
}

/// Extraction service down: the record still exists, empty, in review —
/// no error surfaces to the caller
#[tokio::test]
async fn test_extraction_unavailable_routes_to_review() {
    let pool = db::init_memory_pool().await.unwrap();
    let catalog = Arc::new(CatalogHandle::new(CatalogIndex::build(
        parse_entries(TEST_CATALOG).unwrap(),
        1,
    )));
    let pipeline = IntakePipeline::new(
        pool.clone(),
        Arc::new(UnavailableExtractor),
        catalog,
        EventBus::new(100),
    );

    let (record_id, status, line_count) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "2x pvc pipe 2in").await;

    assert_eq!(status, RecordStatus::NeedsReview);
    assert_eq!(line_count, 0);

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    assert!(record.extraction_failed);
    assert!(record.lines.is_empty());
}

/// Every extracted candidate lands in exactly one line item
#[tokio::test]
async fn test_no_candidate_dropped() {
    let (pool, pipeline) = fixture().await;

    let (record_id, _, line_count) = process_ok(
        &pipeline,
        "Acme Steel",
        "line_oa",
        "Need 2x PVC pipe 2in and 5 copper cable 1.5 for Monday",
    )
    .await;

    assert_eq!(line_count, 2);

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let mut indices: Vec<usize> = record.lines.iter().map(|l| l.candidate_index).collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1]);
}

/// Unparseable text becomes one low-confidence line routed to review,
/// never a vanished request
#[tokio::test]
async fn test_unparseable_message_survives_as_fallback_line() {
    let (pool, pipeline) = fixture().await;

    let (record_id, status, line_count) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "repeat last order of 2\" pvc").await;

    assert_eq!(line_count, 1);
    assert_eq!(status, RecordStatus::NeedsReview);

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let line = &record.lines[0];
    assert!(line.extraction_confidence < 0.5);
    assert_eq!(line.decision, RoutingDecision::NeedsReview);
}

// ============================================================================
// Determinism
// ============================================================================

/// Identical inputs produce identical matching/validation/fusion output
#[tokio::test]
async fn test_pipeline_determinism_across_runs() {
    let (pool_a, pipeline_a) = fixture().await;
    let (pool_b, pipeline_b) = fixture().await;

    let text = "Order: 3 pcs 8p switch, 50m 1.5mm wire";
    let (id_a, _, _) = process_ok(&pipeline_a, "Bright Energy", "email", text).await;
    let (id_b, _, _) = process_ok(&pipeline_b, "Bright Energy", "email", text).await;

    let a = db::records::fetch_record(&pool_a, id_a).await.unwrap();
    let b = db::records::fetch_record(&pool_b, id_b).await.unwrap();

    assert_eq!(a.order_id, b.order_id);
    assert_eq!(a.status, b.status);
    assert_eq!(a.overall_confidence, b.overall_confidence);
    assert_eq!(a.lines.len(), b.lines.len());
    for (la, lb) in a.lines.iter().zip(b.lines.iter()) {
        assert_eq!(la.sku_id, lb.sku_id);
        assert_eq!(la.match_score, lb.match_score);
        assert_eq!(la.match_tier, lb.match_tier);
        assert_eq!(la.composite, lb.composite);
        assert_eq!(la.decision, lb.decision);
    }
}

// ============================================================================
// Audit / provenance
// ============================================================================

/// Assembly appends an audit entry and lines carry stage provenance
#[tokio::test]
async fn test_audit_and_provenance() {
    let (pool, pipeline) = fixture().await;

    let (record_id, _, _) =
        process_ok(&pipeline, "Acme Steel", "line_oa", "2x pvc pipe 2in").await;

    let trail = db::audit::list(&pool, record_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].actor, "pipeline");
    assert_eq!(trail[0].action, "assembled");

    let record = db::records::fetch_record(&pool, record_id).await.unwrap();
    let provenance = &record.lines[0].provenance;
    assert_eq!(provenance.extractor, "pattern/1");
    assert_eq!(provenance.match_tier.as_deref(), Some("exact"));
    assert!(provenance.rules.contains(&"uom_legality".to_string()));
}
