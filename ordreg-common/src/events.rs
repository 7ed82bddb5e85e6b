//! Event types for the ORDREG event system
//!
//! Provides shared event definitions and the EventBus used by the intake
//! service. Events are broadcast in-process and mirrored to connected SSE
//! clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// ORDREG event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrdregEvent {
    /// A new request passed the intake ledger and entered the pipeline
    RequestAdmitted {
        /// Golden record UUID created for the request
        record_id: Uuid,
        /// Customer the request belongs to
        customer_id: String,
        /// Channel the request arrived on
        channel: String,
        /// When the request was admitted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A delivery was suppressed as a duplicate of an earlier request
    DuplicateSuppressed {
        /// Golden record UUID of the prior request
        prior_record_id: Uuid,
        /// Customer the request belongs to
        customer_id: String,
        /// When the duplicate was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A golden record finished assembly
    RecordAssembled {
        /// Golden record UUID
        record_id: Uuid,
        /// Header status after assembly ("validated" or "needs_review")
        status: String,
        /// Number of line items in the record
        line_count: usize,
        /// Overall (minimum) composite confidence across lines
        overall_confidence: f64,
        /// When assembly completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A line item was routed to the human review queue
    LineNeedsReview {
        /// Golden record UUID
        record_id: Uuid,
        /// Line item UUID
        line_id: Uuid,
        /// Composite confidence that triggered review routing
        composite: f64,
        /// When the line was queued
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reviewer decision was applied to a line item
    DecisionApplied {
        /// Golden record UUID
        record_id: Uuid,
        /// Line item UUID the decision targeted
        line_id: Uuid,
        /// Decision kind ("approve", "correct", "remap_sku", "split", "merge")
        decision: String,
        /// When the decision was applied
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The catalog index was reloaded
    CatalogReloaded {
        /// Number of active entries in the new index
        entry_count: usize,
        /// Version counter of the installed index
        version: u64,
        /// When the reload completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A sync outcome was reported by the ERP layer
    SyncReported {
        /// Golden record UUID
        record_id: Uuid,
        /// Reported outcome ("ok" or an error description)
        outcome: String,
        /// When the report was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl OrdregEvent {
    /// Event type name used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            OrdregEvent::RequestAdmitted { .. } => "RequestAdmitted",
            OrdregEvent::DuplicateSuppressed { .. } => "DuplicateSuppressed",
            OrdregEvent::RecordAssembled { .. } => "RecordAssembled",
            OrdregEvent::LineNeedsReview { .. } => "LineNeedsReview",
            OrdregEvent::DecisionApplied { .. } => "DecisionApplied",
            OrdregEvent::CatalogReloaded { .. } => "CatalogReloaded",
            OrdregEvent::SyncReported { .. } => "SyncReported",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrdregEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<OrdregEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: OrdregEvent,
    ) -> Result<usize, broadcast::error::SendError<OrdregEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for non-critical events where it is acceptable that no
    /// component is currently listening.
    pub fn emit_lossy(&self, event: OrdregEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
