//! Playlist expansion
//!
//! A short base list of media items is stretched into the logical playlist a
//! run walks through. Position `i` maps to `base[i mod base.len()]` with its
//! label replaced by `#<i+1>`.

use serde::{Deserialize, Serialize};

use super::assignment;

/// One playable media item, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Opaque content locator, compared by equality only
    pub source: String,
    /// Display label
    pub label: String,
    /// Nominal duration in seconds (informational)
    #[serde(default)]
    pub duration_hint_secs: u32,
}

impl PlaylistItem {
    pub fn new(source: impl Into<String>, label: impl Into<String>, duration_hint_secs: u32) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            duration_hint_secs,
        }
    }
}

/// Content resolved for one logical position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    /// Logical position this content plays at
    pub position: usize,
    /// Logical label (`#<position+1>`)
    pub label: String,
    /// Base item actually bound to the slot
    pub item: PlaylistItem,
}

/// Ordered, immutable logical playlist of N positions
#[derive(Debug, Clone)]
pub struct ExtendedPlaylist {
    base: Vec<PlaylistItem>,
    items: Vec<PlaylistItem>,
}

/// Expand `base` to `target_len` positions by cyclic indexing
///
/// An empty `base` yields an empty playlist, which no sequencer accepts.
pub fn expand(base: &[PlaylistItem], target_len: usize) -> ExtendedPlaylist {
    if base.is_empty() {
        return ExtendedPlaylist {
            base: Vec::new(),
            items: Vec::new(),
        };
    }

    let items = (0..target_len)
        .map(|i| {
            let src = &base[i % base.len()];
            PlaylistItem {
                source: src.source.clone(),
                label: format!("#{}", i + 1),
                duration_hint_secs: src.duration_hint_secs,
            }
        })
        .collect();

    ExtendedPlaylist {
        base: base.to_vec(),
        items,
    }
}

impl ExtendedPlaylist {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn base(&self) -> &[PlaylistItem] {
        &self.base
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&PlaylistItem> {
        self.items.get(position)
    }

    /// Content a pool of `pool_size` slots plays at `position`
    ///
    /// The locator comes from the rotated base index chosen by
    /// [`assignment::source_for`]; the label stays the logical one.
    pub fn resolve(&self, position: usize, pool_size: usize) -> Option<ResolvedItem> {
        let logical = self.items.get(position)?;
        let source_index = assignment::source_for(position, pool_size, self.base.len());
        Some(ResolvedItem {
            position,
            label: logical.label.clone(),
            item: self.base[source_index].clone(),
        })
    }
}
