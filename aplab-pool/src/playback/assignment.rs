//! Logical position → (pool slot, base source) mapping
//!
//! Slots are used round-robin, and each full cycle of the pool shifts every
//! slot's source by one, so slot changes are staggered:
//!
//! ```text
//! K=3, base=3   slot A: #1→0 #4→1 #7→2 ...
//!               slot B: #2→1 #5→2 #8→0 ...
//!               slot C: #3→2 #6→0 #9→1 ...
//! ```
//!
//! Preparation (one step ahead) and playback (current step) both call these
//! functions, so they must stay pure.

use serde::Serialize;

/// Where a logical position plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub position: usize,
    pub slot_index: usize,
    pub source_index: usize,
}

/// Slot that renders `position` in a pool of `pool_size` slots
pub fn slot_for(position: usize, pool_size: usize) -> usize {
    position % pool_size
}

/// Base-list index bound to `position`'s slot
pub fn source_for(position: usize, pool_size: usize, base_len: usize) -> usize {
    let rotation = position / pool_size;
    (slot_for(position, pool_size) + rotation) % base_len
}

pub fn assign(position: usize, pool_size: usize, base_len: usize) -> Assignment {
    Assignment {
        position,
        slot_index: slot_for(position, pool_size),
        source_index: source_for(position, pool_size, base_len),
    }
}
