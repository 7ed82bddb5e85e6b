//! Master Catalog Index
//!
//! Loads the master product catalog and builds the lookup structures the
//! matching engine needs: a normalized-key map for exact matches and
//! per-key token sets for overlap scoring.
//!
//! The index is immutable once built. Hot reload installs a fresh
//! `Arc<CatalogIndex>` behind the handle; in-flight pipeline runs keep
//! the Arc they cloned at start and never observe a half-updated catalog.

use ordreg_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Permitted price range for a SKU
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

/// One entry of the master product catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Canonical SKU id
    pub sku_id: String,
    /// Canonical description
    pub name: String,
    /// Synonym strings (trade names, abbreviations, common misspellings)
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Units of measure this SKU may be ordered in
    #[serde(default)]
    pub permitted_uoms: Vec<String>,
    /// Permitted unit price range
    pub price_band: PriceBand,
    /// Inactive entries are excluded from the index
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A normalized catalog key with its token set and owning entry
#[derive(Debug, Clone)]
struct IndexedKey {
    /// Normalized key text (lowercased, punctuation stripped, tokens sorted)
    normalized: String,
    /// Token set for Jaccard overlap
    tokens: BTreeSet<String>,
    /// Index into `entries`
    entry: usize,
}

/// Immutable catalog index
///
/// Built once per catalog load; shared across concurrent pipeline runs
/// without locking.
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
    by_sku: HashMap<String, usize>,
    /// Normalized key → entry indices (an alias may collide across SKUs)
    exact: HashMap<String, Vec<usize>>,
    keys: Vec<IndexedKey>,
    version: u64,
}

impl CatalogIndex {
    /// Build the index from catalog entries
    ///
    /// Inactive entries are retained for `get` lookups (audit surfaces
    /// may reference them) but generate no match keys.
    pub fn build(entries: Vec<CatalogEntry>, version: u64) -> Self {
        let mut by_sku = HashMap::new();
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut keys = Vec::new();

        for (idx, entry) in entries.iter().enumerate() {
            by_sku.insert(entry.sku_id.clone(), idx);
            if !entry.active {
                continue;
            }

            for alias in std::iter::once(&entry.name).chain(entry.synonyms.iter()) {
                let normalized = normalize(alias);
                if normalized.is_empty() {
                    continue;
                }
                let tokens = token_set(alias);
                let slot = exact.entry(normalized.clone()).or_default();
                if !slot.contains(&idx) {
                    slot.push(idx);
                }
                keys.push(IndexedKey {
                    normalized,
                    tokens,
                    entry: idx,
                });
            }
        }

        Self {
            entries,
            by_sku,
            exact,
            keys,
            version,
        }
    }

    /// Look up an entry by SKU id
    pub fn get(&self, sku_id: &str) -> Option<&CatalogEntry> {
        self.by_sku.get(sku_id).map(|&idx| &self.entries[idx])
    }

    /// Entry indices whose normalized key equals `normalized` verbatim
    pub(crate) fn exact_entries(&self, normalized: &str) -> &[usize] {
        self.exact
            .get(normalized)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate all indexed keys as (normalized, tokens, entry index)
    pub(crate) fn indexed_keys(
        &self,
    ) -> impl Iterator<Item = (&str, &BTreeSet<String>, usize)> {
        self.keys
            .iter()
            .map(|k| (k.normalized.as_str(), &k.tokens, k.entry))
    }

    /// Entry by internal index
    pub(crate) fn entry(&self, idx: usize) -> &CatalogEntry {
        &self.entries[idx]
    }

    /// Number of active entries
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.active).count()
    }

    /// Monotonic version counter of this index instance
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Normalize a description or alias for exact-key comparison
///
/// Lowercase, punctuation stripped, whitespace collapsed. Token order is
/// preserved: "widget, blue" and "blue widget" are distinct exact keys
/// and meet only in the token-overlap tier.
pub fn normalize(text: &str) -> String {
    tokenize(text).collect::<Vec<_>>().join(" ")
}

/// Token set of a description or alias
pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|t| !t.is_empty())
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
}

/// Load catalog entries from a JSON file
///
/// The master catalog boundary: a record-oriented array keyed by
/// `sku_id`. Loaded wholesale; the core does not manage its lifecycle.
pub fn load_entries(path: &Path) -> Result<Vec<CatalogEntry>> {
    let content = std::fs::read_to_string(path)?;
    parse_entries(&content)
}

/// Parse catalog entries from JSON text
pub fn parse_entries(json: &str) -> Result<Vec<CatalogEntry>> {
    serde_json::from_str(json).map_err(|e| Error::Config(format!("Parse catalog failed: {}", e)))
}

/// Shared handle to the current catalog index
///
/// Readers clone the inner Arc and work against that snapshot; `install`
/// swaps in a new index without disturbing snapshots already taken.
pub struct CatalogHandle {
    current: RwLock<Arc<CatalogIndex>>,
}

impl CatalogHandle {
    /// Create a handle over an initial index
    pub fn new(index: CatalogIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Snapshot the current index
    pub async fn snapshot(&self) -> Arc<CatalogIndex> {
        self.current.read().await.clone()
    }

    /// Install a freshly built index, returning its version
    pub async fn install(&self, entries: Vec<CatalogEntry>) -> u64 {
        let mut guard = self.current.write().await;
        let version = guard.version() + 1;
        let index = CatalogIndex::build(entries, version);
        info!(
            version,
            active_entries = index.active_count(),
            "Installed catalog index"
        );
        *guard = Arc::new(index);
        version
    }
}
