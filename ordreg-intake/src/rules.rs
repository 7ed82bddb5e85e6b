//! Validation Rule Engine
//!
//! Business rules are independent pure predicates over a candidate, its
//! top SKU match, and customer metadata. The engine evaluates the full
//! rule set per line and aggregates — no short-circuit on first failure,
//! so every issue is visible in one pass. Rules can be added or removed
//! without reordering dependencies.
//!
//! A rule that itself errors (malformed catalog or customer data) is
//! logged and recorded as that rule failing with `block`: the system
//! fails closed rather than silently passing.

use crate::catalog::CatalogEntry;
use crate::types::{CustomerProfile, LineCandidate, RuleOutcome, SkuMatch};
use thiserror::Error;
use tracing::{error, warn};

/// Error raised by a rule evaluation itself (not a rule violation)
#[derive(Debug, Error)]
pub enum RuleError {
    /// Catalog or customer data the rule needs is malformed
    #[error("Malformed data: {0}")]
    MalformedData(String),
}

/// Everything a rule may inspect for one line
pub struct RuleContext<'a> {
    pub candidate: &'a LineCandidate,
    /// Top-ranked SKU match, if any tier produced one
    pub top_match: Option<&'a SkuMatch>,
    /// Catalog entry for the top match
    pub entry: Option<&'a CatalogEntry>,
    pub customer: &'a CustomerProfile,
}

/// A single business rule
///
/// Each rule produces at most one outcome per line.
pub trait Rule: Send + Sync {
    /// Rule name (stable, used in provenance and audit)
    fn name(&self) -> &'static str;

    /// Evaluate the rule against one line
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError>;
}

// ============================================================================
// Required rules
// ============================================================================

/// Candidate UOM must be in the matched SKU's permitted set
pub struct UomLegality;

impl Rule for UomLegality {
    fn name(&self) -> &'static str {
        "uom_legality"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let entry = match ctx.entry {
            Some(entry) => entry,
            // Without a match there is no permitted set to check;
            // missing_match carries that failure.
            None => return Ok(RuleOutcome::pass(self.name(), "no match to check against")),
        };

        let uom = match ctx.candidate.uom.as_deref() {
            Some(uom) => uom,
            None => return Ok(RuleOutcome::pass(self.name(), "no UOM stated")),
        };

        if entry.permitted_uoms.is_empty() {
            return Err(RuleError::MalformedData(format!(
                "catalog entry {} has an empty permitted UOM set",
                entry.sku_id
            )));
        }

        let legal = entry
            .permitted_uoms
            .iter()
            .any(|permitted| permitted.eq_ignore_ascii_case(uom));

        if legal {
            Ok(RuleOutcome::pass(self.name(), format!("'{}' permitted", uom)))
        } else {
            Ok(RuleOutcome::block(
                self.name(),
                format!(
                    "UOM '{}' not permitted for {} (allowed: {})",
                    uom,
                    entry.sku_id,
                    entry.permitted_uoms.join(", ")
                ),
            ))
        }
    }
}

/// Unit price, when present, must fall within the SKU's price band
///
/// Outside the band by less than 20% is a warning (price lists drift);
/// further out blocks.
pub struct PriceBandRule {
    /// Relative deviation beyond the band that still only warns
    block_tolerance: f64,
}

impl PriceBandRule {
    pub fn new() -> Self {
        Self {
            block_tolerance: 0.20,
        }
    }

    pub fn with_tolerance(block_tolerance: f64) -> Self {
        Self { block_tolerance }
    }
}

impl Default for PriceBandRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for PriceBandRule {
    fn name(&self) -> &'static str {
        "price_band"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let entry = match ctx.entry {
            Some(entry) => entry,
            None => return Ok(RuleOutcome::pass(self.name(), "no match to check against")),
        };
        let price = match ctx.candidate.unit_price {
            Some(price) => price,
            None => return Ok(RuleOutcome::pass(self.name(), "no unit price stated")),
        };

        let band = entry.price_band;
        if band.min > band.max || band.min < 0.0 {
            return Err(RuleError::MalformedData(format!(
                "catalog entry {} has invalid price band [{}, {}]",
                entry.sku_id, band.min, band.max
            )));
        }

        if price >= band.min && price <= band.max {
            return Ok(RuleOutcome::pass(
                self.name(),
                format!("{:.2} within [{:.2}, {:.2}]", price, band.min, band.max),
            ));
        }

        // Relative deviation from the violated bound
        let deviation = if price < band.min {
            (band.min - price) / band.min
        } else {
            (price - band.max) / band.max
        };

        let message = format!(
            "price {:.2} outside band [{:.2}, {:.2}] by {:.0}%",
            price,
            band.min,
            band.max,
            deviation * 100.0
        );

        if deviation < self.block_tolerance {
            Ok(RuleOutcome::warn(self.name(), message))
        } else {
            Ok(RuleOutcome::block(self.name(), message))
        }
    }
}

/// Customer credit / ship-to standing must allow new orders
pub struct CustomerStanding;

impl Rule for CustomerStanding {
    fn name(&self) -> &'static str {
        "customer_standing"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        if ctx.customer.credit_hold {
            return Ok(RuleOutcome::block(
                self.name(),
                format!("customer {} is on credit hold", ctx.customer.customer_id),
            ));
        }
        if ctx.customer.ship_to_blocked {
            return Ok(RuleOutcome::block(
                self.name(),
                format!(
                    "ship-to address for customer {} is blocked",
                    ctx.customer.customer_id
                ),
            ));
        }
        Ok(RuleOutcome::pass(self.name(), "customer in good standing"))
    }
}

/// The matching engine must have produced at least one match
pub struct MissingMatch;

impl Rule for MissingMatch {
    fn name(&self) -> &'static str {
        "missing_match"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        match ctx.top_match {
            Some(m) => Ok(RuleOutcome::pass(
                self.name(),
                format!("matched {}", m.sku_id),
            )),
            None => Ok(RuleOutcome::block(
                self.name(),
                format!("no catalog match for '{}'", ctx.candidate.description),
            )),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Validation Rule Engine
///
/// Holds the active rule set and evaluates all of it per line.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Engine with the required rule set
    pub fn with_default_rules() -> Self {
        Self {
            rules: vec![
                Box::new(MissingMatch),
                Box::new(UomLegality),
                Box::new(PriceBandRule::new()),
                Box::new(CustomerStanding),
            ],
        }
    }

    /// Engine with a custom rule set
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Add a rule to the set
    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Evaluate every rule against one line and aggregate
    ///
    /// Never fails: a rule evaluation error becomes a `block` outcome for
    /// that rule (fail closed).
    pub fn validate(&self, ctx: &RuleContext<'_>) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            match rule.evaluate(ctx) {
                Ok(outcome) => {
                    if outcome.status != crate::types::RuleStatus::Pass {
                        warn!(
                            rule = rule.name(),
                            status = outcome.status.as_str(),
                            message = %outcome.message,
                            "Rule violation"
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(rule = rule.name(), error = %e, "Rule evaluation failed, failing closed");
                    outcomes.push(RuleOutcome::block(
                        rule.name(),
                        format!("rule evaluation failed: {}", e),
                    ));
                }
            }
        }
        outcomes
    }
}
