//! Event types for the aplab event system
//!
//! Provides shared event definitions and the EventBus used by the scheduler
//! (producer) and the SSE endpoint / headless reporter (observers).

mod run_types;

pub use run_types::{RunState, SlotState};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// aplab event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// Producers never wait on observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AplabEvent {
    /// Run state changed
    RunStateChanged {
        /// Run state before change
        old_state: RunState,
        /// Run state after change
        new_state: RunState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A slot finished its play-then-pause activation cycle
    ///
    /// `reason` is set when the host rejected the cycle (non-fatal).
    SlotActivated {
        slot_index: usize,
        succeeded: bool,
        reason: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Next content bound to an idle slot ahead of its turn
    SlotPrepared {
        slot_index: usize,
        /// Logical position the slot was prepared for
        position: usize,
        label: String,
        /// False when the slot already referenced the content (no reload)
        reloaded: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Next step timer armed
    StepScheduled {
        position: usize,
        delay_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A logical position started playing
    PlaybackStarted {
        position: usize,
        slot_index: usize,
        label: String,
        source_label: String,
        src_changed: bool,
        /// Milliseconds since run start
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A play attempt was rejected by the host (fatal to the run)
    PlaybackBlocked {
        position: usize,
        slot_index: usize,
        label: String,
        reason: String,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The slot for a step had no bound playback resource
    ResourceUnavailable {
        position: usize,
        slot_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Step interval changed between runs
    IntervalChanged {
        seconds: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run was reset: timer cancelled, pool stopped, log cleared
    RunReset {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AplabEvent {
    /// Event type string, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AplabEvent::RunStateChanged { .. } => "RunStateChanged",
            AplabEvent::SlotActivated { .. } => "SlotActivated",
            AplabEvent::SlotPrepared { .. } => "SlotPrepared",
            AplabEvent::StepScheduled { .. } => "StepScheduled",
            AplabEvent::PlaybackStarted { .. } => "PlaybackStarted",
            AplabEvent::PlaybackBlocked { .. } => "PlaybackBlocked",
            AplabEvent::ResourceUnavailable { .. } => "ResourceUnavailable",
            AplabEvent::IntervalChanged { .. } => "IntervalChanged",
            AplabEvent::RunReset { .. } => "RunReset",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the sequencer)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use aplab_common::events::{AplabEvent, EventBus, RunState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(AplabEvent::RunStateChanged {
///     old_state: RunState::Idle,
///     new_state: RunState::Activating,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AplabEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// A full run of the pooled preset emits roughly 100 events, so tests
    /// that read after the fact should use at least 256.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AplabEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AplabEvent,
    ) -> Result<usize, broadcast::error::SendError<AplabEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AplabEvent) {
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
