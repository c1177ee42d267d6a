//! Run and slot state type definitions
//!
//! Supporting types for the scheduler's run state and per-slot lifecycle.
//! Owned by the sequencer in aplab-pool; observers only ever see copies.

use serde::{Deserialize, Serialize};

/// Run state enumeration
///
/// The single source of truth for whether new scheduling steps may occur.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run in progress
    #[default]
    Idle,
    /// Slots are being bound and activated
    Activating,
    /// Steps are being scheduled and played
    Running,
    /// Every logical position played
    Succeeded,
    /// A play attempt was rejected; no further steps
    Failed,
}

impl RunState {
    /// True while the sequencer owns the pool (no external control changes allowed)
    pub fn is_in_progress(self) -> bool {
        matches!(self, RunState::Activating | RunState::Running)
    }

    /// True once a run has reached a terminal state
    pub fn is_finished(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Activating => write!(f, "activating"),
            RunState::Running => write!(f, "running"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Pool slot lifecycle state
///
/// `Idle → Activated → (Preparing ⇄ Playing) → Idle` (on reset)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SlotState {
    /// Bound (or not) but never activated in this run
    #[default]
    Idle,
    /// Survived the play-then-pause activation cycle
    Activated,
    /// Next content is loading while another slot plays
    Preparing,
    /// The one slot currently rendering
    Playing,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Idle => write!(f, "Idle"),
            SlotState::Activated => write!(f, "Activated"),
            SlotState::Preparing => write!(f, "Preparing"),
            SlotState::Playing => write!(f, "Playing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_in_progress() {
        assert!(!RunState::Idle.is_in_progress());
        assert!(RunState::Activating.is_in_progress());
        assert!(RunState::Running.is_in_progress());
        assert!(!RunState::Succeeded.is_in_progress());
        assert!(!RunState::Failed.is_in_progress());
    }

    #[test]
    fn test_run_state_serializes_lowercase() {
        let json = serde_json::to_string(&RunState::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
    }

    #[test]
    fn test_slot_state_default_is_idle() {
        assert_eq!(SlotState::default(), SlotState::Idle);
        assert_eq!(SlotState::Preparing.to_string(), "Preparing");
    }
}
