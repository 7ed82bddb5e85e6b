//! Core Types and Trait Definitions for the Intake Pipeline
//!
//! Defines the data contracts between pipeline stages:
//! - **Extraction:** `CandidateExtractor` trait producing `LineCandidate`s
//! - **Matching:** `SkuMatch` with tier provenance
//! - **Validation:** `RuleOutcome` with pass/warn/block status
//! - **Fusion:** `Fused` composite score and routing decision
//!
//! Explicit contracts between stages keep the pipeline replayable: every
//! stage is a pure function of its typed inputs, so identical inputs
//! reproduce identical golden records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Extraction
// ============================================================================

/// An unvalidated line item extracted from free text
///
/// Produced by a `CandidateExtractor`; owned by the golden record build
/// until finalized into a `LineItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCandidate {
    /// Source description, as extracted (before normalization)
    pub description: String,
    /// Ordered quantity (fractional for metered goods, e.g. 12.5 m of cable)
    pub quantity: f64,
    /// Unit of measure as extracted (None when the message names none)
    pub uom: Option<String>,
    /// Unit price as extracted (most messages omit it)
    pub unit_price: Option<f64>,
    /// Extraction confidence in [0,1]
    pub confidence: f64,
}

/// Extraction error
///
/// `Unavailable` is a routing condition, not a pipeline failure: the
/// caller maps it to zero candidates plus review routing.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Extraction service unreachable or timed out
    #[error("Extraction service unavailable: {0}")]
    Unavailable(String),

    /// Service responded with a payload that violates the contract
    #[error("Malformed extraction response: {0}")]
    Malformed(String),
}

/// Candidate extraction boundary
///
/// The built-in `PatternExtractor` and the remote `RemoteExtractor` both
/// implement this; the rest of the pipeline treats them identically —
/// every candidate carries an explicit confidence regardless of origin.
#[async_trait::async_trait]
pub trait CandidateExtractor: Send + Sync {
    /// Extractor id for provenance tracking
    fn id(&self) -> &'static str;

    /// Extractor version for provenance tracking
    fn version(&self) -> &'static str;

    /// Extract line candidates from raw message text
    ///
    /// Zero candidates is a valid outcome (unrecognizable text), not an
    /// error.
    ///
    /// # Errors
    /// Returns `ExtractionError::Unavailable` when a backing service
    /// cannot be reached; the pipeline routes the record to review
    /// instead of aborting.
    async fn extract(
        &self,
        text: &str,
        attachments: &[String],
    ) -> Result<Vec<LineCandidate>, ExtractionError>;
}

// ============================================================================
// Matching
// ============================================================================

/// Which matching tier produced a SKU match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Normalized candidate equals a normalized catalog key verbatim
    Exact,
    /// Token-overlap (Jaccard) above the synonym floor
    Synonym,
    /// Normalized Levenshtein similarity above the fuzzy floor
    Fuzzy,
    /// Asserted by a human reviewer (remap decision)
    Manual,
}

impl MatchTier {
    /// String form stored in the database and surfaced in provenance
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Synonym => "synonym",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Manual => "manual",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(MatchTier::Exact),
            "synonym" => Some(MatchTier::Synonym),
            "fuzzy" => Some(MatchTier::Fuzzy),
            "manual" => Some(MatchTier::Manual),
            _ => None,
        }
    }
}

/// A ranked SKU resolution for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuMatch {
    /// Canonical SKU id from the catalog
    pub sku_id: String,
    /// Similarity score in [0,1]; 1.0 for exact matches
    pub score: f64,
    /// Tier that produced this match
    pub tier: MatchTier,
}

// ============================================================================
// Validation
// ============================================================================

/// Outcome status of a single business rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Rule satisfied
    Pass,
    /// Rule violated, non-blocking
    Warn,
    /// Rule violated, blocks validation
    Block,
}

impl RuleStatus {
    /// String form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Pass => "pass",
            RuleStatus::Warn => "warn",
            RuleStatus::Block => "block",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(RuleStatus::Pass),
            "warn" => Some(RuleStatus::Warn),
            "block" => Some(RuleStatus::Block),
            _ => None,
        }
    }
}

/// Result of evaluating one business rule against one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Rule name (provenance)
    pub rule: String,
    /// Pass / warn / block
    pub status: RuleStatus,
    /// Human-readable explanation
    pub message: String,
}

impl RuleOutcome {
    pub fn pass(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            status: RuleStatus::Pass,
            message: message.into(),
        }
    }

    pub fn warn(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            status: RuleStatus::Warn,
            message: message.into(),
        }
    }

    pub fn block(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            status: RuleStatus::Block,
            message: message.into(),
        }
    }
}

// ============================================================================
// Fusion
// ============================================================================

/// Routing decision for a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Line may flow to fulfillment without human review
    AutoAccept,
    /// Line must be reviewed by a human
    NeedsReview,
}

impl RoutingDecision {
    /// String form stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::AutoAccept => "auto_accept",
            RoutingDecision::NeedsReview => "needs_review",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto_accept" => Some(RoutingDecision::AutoAccept),
            "needs_review" => Some(RoutingDecision::NeedsReview),
            _ => None,
        }
    }
}

/// Fused confidence for a line item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fused {
    /// Composite confidence in [0,1]
    pub composite: f64,
    /// Routing decision derived from the composite and rule outcomes
    pub decision: RoutingDecision,
}

// ============================================================================
// Customer metadata
// ============================================================================

/// Customer standing metadata used by validation rules
///
/// Sourced from the customers table; unknown customers default to clear
/// standing (absence of metadata is not a block condition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: String,
    pub name: String,
    /// Credit status disallows new orders
    pub credit_hold: bool,
    /// Shipping destination is blocked
    pub ship_to_blocked: bool,
}

impl CustomerProfile {
    /// Profile for a customer with no stored metadata
    pub fn unrestricted(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            name: customer_id.to_string(),
            credit_hold: false,
            ship_to_blocked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_tier_round_trip() {
        for tier in [
            MatchTier::Exact,
            MatchTier::Synonym,
            MatchTier::Fuzzy,
            MatchTier::Manual,
        ] {
            assert_eq!(MatchTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(MatchTier::parse("unknown"), None);
    }

    #[test]
    fn test_rule_status_round_trip() {
        for status in [RuleStatus::Pass, RuleStatus::Warn, RuleStatus::Block] {
            assert_eq!(RuleStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_routing_decision_serde_form() {
        let json = serde_json::to_value(RoutingDecision::NeedsReview).unwrap();
        assert_eq!(json, "needs_review");
    }
}
