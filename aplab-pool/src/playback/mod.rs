//! Pooled playback scheduling
//!
//! Leaf first: playlist expansion and slot assignment are pure; the pool
//! drives media elements; the sequencer owns the run, its timer and its log.

pub mod assignment;
pub mod log;
pub mod media;
pub mod playlist;
pub mod pool;
pub mod sequencer;
pub mod simulated;
pub mod timer;

pub use log::{EntryOutcome, PlaybackLog, PlaybackLogEntry};
pub use media::{MediaElement, MediaHost, PlayRejection};
pub use playlist::{expand, ExtendedPlaylist, PlaylistItem};
pub use pool::{ActivationMode, ResourcePool};
pub use sequencer::{Sequencer, SequencerSettings};
pub use simulated::{SimulatedHost, SimulatorConfig};
