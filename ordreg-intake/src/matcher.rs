//! SKU Matching Engine
//!
//! Resolves a candidate description to ranked SKU matches against a
//! catalog snapshot. Three tiers, evaluated in order; the first tier that
//! yields anything wins:
//!
//! 1. **Exact** — normalized candidate equals a normalized catalog key
//!    verbatim → score 1.0.
//! 2. **Synonym** — Jaccard overlap of token sets ≥ the synonym floor.
//! 3. **Fuzzy** — normalized Levenshtein similarity ≥ the fuzzy floor,
//!    against every catalog key.
//!
//! Ties within a tier break on shorter canonical name, then lexical
//! SKU id, so repeated runs return identical rankings.

use crate::catalog::{normalize, token_set, CatalogIndex};
use crate::types::{MatchTier, SkuMatch};
use std::collections::BTreeSet;
use std::collections::HashMap;
use tracing::debug;

/// Matching floors (tier cut-offs)
#[derive(Debug, Clone, Copy)]
pub struct MatchFloors {
    /// Minimum Jaccard overlap for the synonym tier
    pub synonym_floor: f64,
    /// Minimum normalized Levenshtein similarity for the fuzzy tier
    pub fuzzy_floor: f64,
}

impl Default for MatchFloors {
    fn default() -> Self {
        Self {
            synonym_floor: 0.5,
            fuzzy_floor: 0.6,
        }
    }
}

/// SKU Matcher
pub struct SkuMatcher {
    floors: MatchFloors,
}

impl SkuMatcher {
    /// Create a matcher with default floors
    pub fn new() -> Self {
        Self {
            floors: MatchFloors::default(),
        }
    }

    /// Create a matcher with explicit floors
    pub fn with_floors(floors: MatchFloors) -> Self {
        Self { floors }
    }

    /// Resolve a description to ranked SKU matches
    ///
    /// Returns an empty vec when no tier clears its floor — "no
    /// reasonable candidate" is distinct from a low-confidence match.
    pub fn lookup(&self, index: &CatalogIndex, description: &str) -> Vec<SkuMatch> {
        let normalized = normalize(description);
        if normalized.is_empty() {
            return Vec::new();
        }

        // Tier 1: exact normalized-key equality
        let exact = index.exact_entries(&normalized);
        if !exact.is_empty() {
            let mut matches: Vec<SkuMatch> = exact
                .iter()
                .map(|&idx| SkuMatch {
                    sku_id: index.entry(idx).sku_id.clone(),
                    score: 1.0,
                    tier: MatchTier::Exact,
                })
                .collect();
            sort_ranked(&mut matches, index);
            debug!(description, matches = matches.len(), "Exact tier hit");
            return matches;
        }

        // Tier 2: token overlap (Jaccard over token sets)
        let candidate_tokens = token_set(description);
        let overlap = self.score_tier(index, |_, tokens| {
            jaccard(&candidate_tokens, tokens)
        });
        let mut matches =
            self.collect_above(index, overlap, self.floors.synonym_floor, MatchTier::Synonym);
        if !matches.is_empty() {
            sort_ranked(&mut matches, index);
            debug!(description, matches = matches.len(), "Synonym tier hit");
            return matches;
        }

        // Tier 3: edit-distance similarity against every catalog key
        let fuzzy = self.score_tier(index, |key, _| {
            strsim::normalized_levenshtein(&normalized, key)
        });
        matches = self.collect_above(index, fuzzy, self.floors.fuzzy_floor, MatchTier::Fuzzy);
        sort_ranked(&mut matches, index);
        debug!(description, matches = matches.len(), "Fuzzy tier result");
        matches
    }

    /// Score every entry by its best key under `score_fn`
    fn score_tier<F>(&self, index: &CatalogIndex, score_fn: F) -> HashMap<usize, f64>
    where
        F: Fn(&str, &BTreeSet<String>) -> f64,
    {
        let mut best: HashMap<usize, f64> = HashMap::new();
        for (key, tokens, entry_idx) in index.indexed_keys() {
            let score = score_fn(key, tokens);
            let slot = best.entry(entry_idx).or_insert(0.0);
            if score > *slot {
                *slot = score;
            }
        }
        best
    }

    /// Keep entries at or above the floor as matches of the given tier
    fn collect_above(
        &self,
        index: &CatalogIndex,
        scores: HashMap<usize, f64>,
        floor: f64,
        tier: MatchTier,
    ) -> Vec<SkuMatch> {
        scores
            .into_iter()
            .filter(|&(_, score)| score >= floor)
            .map(|(idx, score)| SkuMatch {
                sku_id: index.entry(idx).sku_id.clone(),
                score,
                tier,
            })
            .collect()
    }
}

impl Default for SkuMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Jaccard similarity of two token sets
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Deterministic ranking: score desc, then shorter canonical name, then
/// lexical SKU id
fn sort_ranked(matches: &mut [SkuMatch], index: &CatalogIndex) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let len_a = index.get(&a.sku_id).map(|e| e.name.len()).unwrap_or(usize::MAX);
                let len_b = index.get(&b.sku_id).map(|e| e.name.len()).unwrap_or(usize::MAX);
                len_a.cmp(&len_b)
            })
            .then_with(|| a.sku_id.cmp(&b.sku_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, PriceBand};

    fn entry(sku: &str, name: &str, synonyms: &[&str]) -> CatalogEntry {
        CatalogEntry {
            sku_id: sku.to_string(),
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            permitted_uoms: vec!["each".to_string()],
            price_band: PriceBand { min: 1.0, max: 10.0 },
            active: true,
        }
    }

    fn index(entries: Vec<CatalogEntry>) -> CatalogIndex {
        CatalogIndex::build(entries, 1)
    }

    #[test]
    fn test_exact_canonical_name_scores_one() {
        let idx = index(vec![
            entry("SKU-1", "blue widget", &[]),
            entry("SKU-2", "blue widget deluxe", &[]),
        ]);
        let matches = SkuMatcher::new().lookup(&idx, "Blue Widget");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sku_id, "SKU-1");
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[0].tier, MatchTier::Exact);
    }

    #[test]
    fn test_exact_covers_synonym_keys_verbatim() {
        let idx = index(vec![entry("SKU-1", "widget assembly", &["widget, blue"])]);
        let matches = SkuMatcher::new().lookup(&idx, "Widget Blue");

        assert_eq!(matches[0].tier, MatchTier::Exact);
        assert_eq!(matches[0].score, 1.0);
    }

    #[test]
    fn test_reordered_tokens_land_in_synonym_tier() {
        // Same tokens, different order: full overlap but not verbatim
        let idx = index(vec![entry("SKU-1", "widget deluxe", &["widget, blue"])]);
        let matches = SkuMatcher::new().lookup(&idx, "blue widget");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Synonym);
        assert!((matches[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_synonym_tier_token_overlap() {
        let idx = index(vec![entry("SKU-1", "widget premium blue", &[])]);
        // "blue widget" vs "widget premium blue": intersection 2, union 3
        let matches = SkuMatcher::new().lookup(&idx, "blue widget");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Synonym);
        assert!((matches[0].score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_synonym_floor_excludes_weak_overlap() {
        let idx = index(vec![entry("SKU-1", "copper cable shielded outdoor", &[])]);
        // intersection 1 ("copper"), union 6 → 0.17 < 0.5 floor; fuzzy
        // distance is far too; expect empty
        let matches = SkuMatcher::new().lookup(&idx, "copper pipe fitting");
        assert!(matches.is_empty());
    }

    #[test]
    fn test_fuzzy_tier_catches_typos() {
        let idx = index(vec![entry("SKU-1", "widget", &[])]);
        let matches = SkuMatcher::new().lookup(&idx, "widgit");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].tier, MatchTier::Fuzzy);
        // levenshtein("widget","widgit") = 1 → 1 - 1/6
        assert!((matches[0].score - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_no_tier_yields_empty_not_placeholder() {
        let idx = index(vec![entry("SKU-1", "hydraulic press", &[])]);
        let matches = SkuMatcher::new().lookup(&idx, "paper towels");
        assert!(matches.is_empty());
    }

    #[test]
    fn test_tie_break_shorter_name_then_sku() {
        // Both entries share the alias token set via synonyms
        let idx = index(vec![
            entry("SKU-B", "long widget name here", &["widget kit"]),
            entry("SKU-A", "widget kit set", &["widget kit"]),
        ]);
        let matches = SkuMatcher::new().lookup(&idx, "widget kit");

        // Both exact via synonym key; shorter canonical name first
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].sku_id, "SKU-A");
        assert_eq!(matches[1].sku_id, "SKU-B");
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let idx = index(vec![
            entry("SKU-1", "pvc pipe 2in", &["2\" pvc"]),
            entry("SKU-2", "pvc pipe 4in", &["4\" pvc"]),
        ]);
        let matcher = SkuMatcher::new();
        let a = matcher.lookup(&idx, "pvc pipe");
        let b = matcher.lookup(&idx, "pvc pipe");
        assert_eq!(a, b);
    }
}
