//! Pattern-Based Candidate Extractor
//!
//! Minimal built-in extraction: scans the message for structured-looking
//! order lines of the shape
//!
//! ```text
//! <qty> [x] <description> [@ <unit price>]
//! ```
//!
//! where `<description>` may end in a recognized unit of measure
//! ("3 pcs 8p switch", "50m 1.5mm wire", "2x PVC pipe"). Lines matching
//! the template get high extraction confidence; a message with no
//! recognizable lines falls back to a single low-confidence candidate
//! covering the whole message (quantity 1), so unparseable requests are
//! routed to review instead of dropped.

use crate::types::{CandidateExtractor, ExtractionError, LineCandidate};
use tracing::debug;

/// Confidence for lines matching the qty/description template
const TEMPLATE_CONFIDENCE: f64 = 0.9;
/// Confidence for the whole-message fallback candidate
const FALLBACK_CONFIDENCE: f64 = 0.4;

/// How many lead-in words may precede the quantity token ("Need 2x ...")
const MAX_LEAD_IN_TOKENS: usize = 2;

/// Units of measure the extractor recognizes as trailing/embedded markers
const KNOWN_UOMS: &[&str] = &[
    "each", "pc", "pcs", "piece", "pieces", "box", "boxes", "m", "meter", "meters", "roll",
    "rolls", "set", "sets", "pack", "packs",
];

/// Built-in pattern-based extractor
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse one comma- or newline-separated segment into a candidate
    ///
    /// A segment is a template line only when a quantity token appears
    /// within the first few words; everything after it is description.
    fn parse_segment(segment: &str) -> Option<LineCandidate> {
        let trimmed = segment.trim().trim_matches(|c| c == '-' || c == '*' || c == '.');
        if trimmed.is_empty() {
            return None;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        // Quantity token: "5", "5x", "50m" (quantity with embedded UOM),
        // allowing a short lead-in ("Need 2x ...")
        let qty_pos = tokens
            .iter()
            .position(|t| parse_quantity_token(t).is_some())?;
        if qty_pos > MAX_LEAD_IN_TOKENS {
            return None;
        }
        let (quantity, embedded_uom) = parse_quantity_token(tokens[qty_pos])?;

        let mut rest: &[&str] = &tokens[qty_pos + 1..];

        // Optional standalone "x" separator after the quantity
        if let Some(&sep) = rest.first() {
            if sep.eq_ignore_ascii_case("x") {
                rest = &rest[1..];
            }
        }
        if rest.is_empty() {
            return None;
        }

        // Optional trailing price: "@ 4.50"
        let (rest, unit_price) = split_price(rest);
        if rest.is_empty() {
            return None;
        }

        // UOM: embedded in the quantity token ("50m"), a leading unit
        // word ("3 pcs 8p switch"), or absent
        let (description_tokens, uom) = match embedded_uom {
            Some(u) => (rest, Some(u)),
            None => split_leading_uom(rest),
        };
        if description_tokens.is_empty() {
            return None;
        }

        Some(LineCandidate {
            description: description_tokens.join(" "),
            quantity,
            uom,
            unit_price,
            confidence: TEMPLATE_CONFIDENCE,
        })
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CandidateExtractor for PatternExtractor {
    fn id(&self) -> &'static str {
        "pattern"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    async fn extract(
        &self,
        text: &str,
        _attachments: &[String],
    ) -> Result<Vec<LineCandidate>, ExtractionError> {
        let mut candidates = Vec::new();

        for line in text.lines() {
            // Strip common lead-ins ("Order:", "Need") before segmenting
            let line = strip_lead_in(line);
            for segment in line.split(&[',', ';'][..]) {
                // Segments may still chain with "and"
                for part in segment.split(" and ") {
                    if let Some(candidate) = Self::parse_segment(part) {
                        candidates.push(candidate);
                    }
                }
            }
        }

        if candidates.is_empty() {
            let whole = text.trim();
            if whole.is_empty() {
                return Ok(Vec::new());
            }
            // Whole-message fallback: one low-confidence line, qty 1
            debug!("No template lines recognized, using whole-message fallback");
            candidates.push(LineCandidate {
                description: whole.to_string(),
                quantity: 1.0,
                uom: None,
                unit_price: None,
                confidence: FALLBACK_CONFIDENCE,
            });
        }

        debug!(count = candidates.len(), "Extracted candidates");
        Ok(candidates)
    }
}

/// Strip conversational lead-ins up to a colon ("Order: ...")
fn strip_lead_in(line: &str) -> &str {
    match line.split_once(':') {
        // Only treat short prefixes as lead-ins; a colon deep in the
        // line is part of the content
        Some((prefix, rest)) if prefix.len() <= 12 && !prefix.chars().any(|c| c.is_numeric()) => {
            rest
        }
        _ => line,
    }
}

/// Parse "5", "5x", "50m", "2.5" into (quantity, embedded UOM)
fn parse_quantity_token(token: &str) -> Option<(f64, Option<String>)> {
    let token = token.trim();
    let split = token
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(token.len());

    let (digits, suffix) = token.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let quantity: f64 = digits.parse().ok()?;
    if quantity <= 0.0 {
        return None;
    }

    match suffix {
        "" => Some((quantity, None)),
        "x" | "X" => Some((quantity, None)),
        s if is_known_uom(s) => Some((quantity, Some(normalize_uom(s)))),
        _ => None,
    }
}

/// Split a leading unit word off the description ("pcs 8p switch")
fn split_leading_uom<'a>(tokens: Vec<&'a str>) -> (Vec<&'a str>, Option<String>) {
    match tokens.first() {
        Some(first) if is_known_uom(first) && tokens.len() > 1 => {
            let uom = normalize_uom(first);
            (tokens[1..].to_vec(), Some(uom))
        }
        _ => (tokens, None),
    }
}

/// Split a trailing "@ <price>" marker off the token list
fn split_price<'a>(tokens: &[&'a str]) -> (Vec<&'a str>, Option<f64>) {
    if let Some(pos) = tokens.iter().position(|&t| t == "@") {
        if let Some(price_token) = tokens.get(pos + 1) {
            if let Ok(price) = price_token.trim_start_matches('$').parse::<f64>() {
                return (tokens[..pos].to_vec(), Some(price));
            }
        }
    }
    (tokens.to_vec(), None)
}

fn is_known_uom(token: &str) -> bool {
    KNOWN_UOMS
        .iter()
        .any(|u| u.eq_ignore_ascii_case(token.trim_matches('.')))
}

/// Canonical UOM spelling: plurals and abbreviations fold together
fn normalize_uom(token: &str) -> String {
    match token.trim_matches('.').to_lowercase().as_str() {
        "pc" | "pcs" | "piece" | "pieces" | "each" => "each".to_string(),
        "box" | "boxes" => "box".to_string(),
        "m" | "meter" | "meters" => "m".to_string(),
        "roll" | "rolls" => "roll".to_string(),
        "set" | "sets" => "set".to_string(),
        "pack" | "packs" => "pack".to_string(),
        other => other.to_string(),
    }
}
