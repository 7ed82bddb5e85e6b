//! Confidence Fusion
//!
//! Combines extraction confidence, match score, and rule outcomes into a
//! single composite score and a routing decision.
//!
//! The composite is the **minimum** of extraction confidence and match
//! score, reduced by a fixed penalty per warning, clamped to zero when
//! any block is present. Minimum, not average: a single weak signal (bad
//! extraction OR bad match) must not be hidden by an otherwise-strong
//! one, since either alone produces an unreliable order line.

use crate::types::{Fused, RoutingDecision, RuleOutcome, RuleStatus};

/// Fusion parameters
///
/// Implementers with different business requirements may retune the
/// constants; the shape (monotonic, fail-closed) stays fixed.
#[derive(Debug, Clone, Copy)]
pub struct FusionParams {
    /// Composite reduction per `warn` outcome
    pub warn_penalty: f64,
    /// Composite below this routes the line to human review
    pub review_threshold: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            warn_penalty: 0.1,
            review_threshold: 0.8,
        }
    }
}

/// Confidence Fuser
pub struct ConfidenceFuser {
    params: FusionParams,
}

impl ConfidenceFuser {
    /// Fuser with default parameters
    pub fn new() -> Self {
        Self {
            params: FusionParams::default(),
        }
    }

    /// Fuser with explicit parameters
    pub fn with_params(params: FusionParams) -> Self {
        Self { params }
    }

    /// Fuse signals for one line item
    ///
    /// `match_score` is 0.0 when the matcher returned nothing; the
    /// missing-match block drives the composite to zero regardless.
    pub fn fuse(
        &self,
        extraction_confidence: f64,
        match_score: f64,
        outcomes: &[RuleOutcome],
    ) -> Fused {
        let has_block = outcomes.iter().any(|o| o.status == RuleStatus::Block);
        let warn_count = outcomes
            .iter()
            .filter(|o| o.status == RuleStatus::Warn)
            .count();

        let composite = if has_block {
            0.0
        } else {
            let base = extraction_confidence.min(match_score);
            (base - self.params.warn_penalty * warn_count as f64).clamp(0.0, 1.0)
        };

        let decision = if has_block || composite < self.params.review_threshold {
            RoutingDecision::NeedsReview
        } else {
            RoutingDecision::AutoAccept
        };

        Fused {
            composite,
            decision,
        }
    }
}

impl Default for ConfidenceFuser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleOutcome;

    fn passes() -> Vec<RuleOutcome> {
        vec![
            RuleOutcome::pass("missing_match", "matched"),
            RuleOutcome::pass("uom_legality", "ok"),
        ]
    }

    #[test]
    fn test_minimum_not_average() {
        let fused = ConfidenceFuser::new().fuse(0.95, 0.5, &passes());
        assert!((fused.composite - 0.5).abs() < 1e-9);
        assert_eq!(fused.decision, RoutingDecision::NeedsReview);

        let fused = ConfidenceFuser::new().fuse(0.5, 0.95, &passes());
        assert!((fused.composite - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_strong_signals_auto_accept() {
        let fused = ConfidenceFuser::new().fuse(0.9, 1.0, &passes());
        assert!((fused.composite - 0.9).abs() < 1e-9);
        assert_eq!(fused.decision, RoutingDecision::AutoAccept);
    }

    #[test]
    fn test_warn_penalty_is_monotonic() {
        let fuser = ConfidenceFuser::new();
        let no_warn = fuser.fuse(0.9, 1.0, &passes());

        let mut one_warn = passes();
        one_warn.push(RuleOutcome::warn("price_band", "10% over"));
        let with_warn = fuser.fuse(0.9, 1.0, &one_warn);

        assert!(with_warn.composite < no_warn.composite);
        assert!((with_warn.composite - 0.8).abs() < 1e-9);

        let mut two_warns = one_warn.clone();
        two_warns.push(RuleOutcome::warn("other", "also off"));
        let with_two = fuser.fuse(0.9, 1.0, &two_warns);
        assert!(with_two.composite < with_warn.composite);
    }

    #[test]
    fn test_block_clamps_to_zero_and_forces_review() {
        let mut outcomes = passes();
        outcomes.push(RuleOutcome::block("uom_legality", "box not permitted"));

        // Match score 1.0 cannot rescue a blocked line
        let fused = ConfidenceFuser::new().fuse(1.0, 1.0, &outcomes);
        assert_eq!(fused.composite, 0.0);
        assert_eq!(fused.decision, RoutingDecision::NeedsReview);
    }

    #[test]
    fn test_threshold_boundary() {
        let fuser = ConfidenceFuser::new();
        // Exactly at threshold accepts
        let at = fuser.fuse(0.8, 1.0, &passes());
        assert_eq!(at.decision, RoutingDecision::AutoAccept);
        // Just below reviews
        let below = fuser.fuse(0.79, 1.0, &passes());
        assert_eq!(below.decision, RoutingDecision::NeedsReview);
    }

    #[test]
    fn test_penalty_floor_at_zero() {
        let mut outcomes = passes();
        for i in 0..12 {
            outcomes.push(RuleOutcome::warn("w", format!("warn {}", i)));
        }
        let fused = ConfidenceFuser::new().fuse(0.9, 0.9, &outcomes);
        assert_eq!(fused.composite, 0.0);
    }

    #[test]
    fn test_determinism() {
        let fuser = ConfidenceFuser::new();
        let mut outcomes = passes();
        outcomes.push(RuleOutcome::warn("price_band", "drift"));
        let a = fuser.fuse(0.85, 0.7, &outcomes);
        let b = fuser.fuse(0.85, 0.7, &outcomes);
        assert_eq!(a, b);
    }
}
