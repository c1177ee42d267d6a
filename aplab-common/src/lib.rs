//! # aplab Common Library
//!
//! Shared code for the autoplay lab crates including:
//! - Run and slot state types shared by the scheduler and its observers
//! - Event types (AplabEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - Time helpers for relative timestamps

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
