//! Observer views of a run
//!
//! Plain serializable snapshots handed to the API and the headless reporter.
//! Nothing here is shared mutable state; the sequencer owns that.

use serde::Serialize;
use uuid::Uuid;

use crate::playback::pool::{ActivationMode, SlotActivation, SlotSnapshot};

// Re-export RunState from aplab-common for API consumers
pub use aplab_common::events::RunState;

/// Point-in-time view of the sequencer
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    /// Set from `start()` until the next `reset()`
    pub run_id: Option<Uuid>,
    pub state: RunState,
    pub interval_seconds: u32,
    /// Last position that reached the pool
    pub current_position: Option<usize>,
    pub playlist_length: usize,
    pub pool_size: usize,
    pub activation: ActivationMode,
    /// Milliseconds since `start()`, None when idle
    pub elapsed_ms: Option<u64>,
    pub slots: Vec<SlotSnapshot>,
    pub activations: Vec<SlotActivation>,
    pub log_length: usize,
}

/// One row of the playback plan: what plays where
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRow {
    pub position: usize,
    pub label: String,
    pub slot_index: usize,
    pub slot_name: String,
    pub source_index: usize,
    pub source_label: String,
    pub source: String,
}
