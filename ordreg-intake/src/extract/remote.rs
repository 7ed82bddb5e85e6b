//! Remote Extraction Service Client
//!
//! Adapter over the external extraction service (a model-backed
//! structured extractor). The wire contract: POST the raw text and
//! attachment references, receive one entry per candidate line item with
//! per-field confidences. Absence of a field is distinct from a
//! zero-confidence field — absent fields simply contribute nothing.
//!
//! Transport failures and timeouts surface as
//! `ExtractionError::Unavailable`; the pipeline routes the record to
//! review with zero candidates rather than aborting, and retry is left
//! to the caller.

use crate::types::{CandidateExtractor, ExtractionError, LineCandidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Request payload sent to the extraction service
#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    text: &'a str,
    attachments: &'a [String],
}

/// One extracted line item on the wire
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteLineItem {
    /// Extracted description
    pub description: String,
    /// Extracted quantity
    pub quantity: f64,
    /// Unit of measure (absent when the model found none)
    pub uom: Option<String>,
    /// Unit price (absent when the model found none)
    pub unit_price: Option<f64>,
    /// Per-field confidence in [0,1], keyed by field name
    #[serde(default)]
    pub field_confidence: HashMap<String, f64>,
}

/// Extraction service response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteResponse {
    pub items: Vec<RemoteLineItem>,
}

/// Client for the remote extraction service
pub struct RemoteExtractor {
    client: reqwest::Client,
    extract_url: String,
}

impl RemoteExtractor {
    /// Create a client for the service at `base_url`
    ///
    /// # Errors
    /// Returns `Unavailable` if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ExtractionError::Unavailable(format!("client init failed: {}", e)))?;

        Ok(Self {
            client,
            extract_url: format!("{}/extract", base_url.trim_end_matches('/')),
        })
    }

    /// Fold per-field confidences into one candidate confidence
    ///
    /// Minimum over the provided fields: a candidate is only as reliable
    /// as its least reliable extracted field. No confidences at all is a
    /// contract violation treated as lowest usable confidence.
    fn candidate_confidence(item: &RemoteLineItem) -> f64 {
        item.field_confidence
            .values()
            .fold(None, |acc: Option<f64>, &c| {
                Some(acc.map_or(c, |a| a.min(c)))
            })
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }
}

#[async_trait::async_trait]
impl CandidateExtractor for RemoteExtractor {
    fn id(&self) -> &'static str {
        "remote"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    async fn extract(
        &self,
        text: &str,
        attachments: &[String],
    ) -> Result<Vec<LineCandidate>, ExtractionError> {
        let request = RemoteRequest { text, attachments };

        let response = self
            .client
            .post(&self.extract_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Extraction service unreachable");
                ExtractionError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Extraction service returned error status");
            return Err(ExtractionError::Unavailable(format!(
                "service returned {}",
                status
            )));
        }

        let parsed: RemoteResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let candidates: Vec<LineCandidate> = parsed
            .items
            .into_iter()
            .map(|item| {
                let confidence = Self::candidate_confidence(&item);
                LineCandidate {
                    description: item.description,
                    quantity: item.quantity,
                    uom: item.uom,
                    unit_price: item.unit_price,
                    confidence,
                }
            })
            .collect();

        debug!(count = candidates.len(), "Remote extraction complete");
        Ok(candidates)
    }
}
