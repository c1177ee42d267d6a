//! # aplab-pool
//!
//! Sequential resource-pooled playback scheduler for autoplay-policy
//! experiments.
//!
//! **Purpose:** Cover a long logical playlist with a small pool of reusable
//! playback handles, activated up front while user activation is still
//! valid, then handed over one timed step at a time.
//!
//! **Architecture:** `playback` holds the scheduler (playlist expansion,
//! slot assignment, resource pool, sequencer, playback log) on top of a
//! `MediaHost` abstraction; `api` exposes run controls over HTTP + SSE.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use playback::Sequencer;
pub use state::RunSnapshot;
