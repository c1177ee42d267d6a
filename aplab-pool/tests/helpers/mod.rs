//! Test helpers for aplab-pool integration tests
//!
//! - ScriptedHost: media host with fault injection (rejected play calls,
//!   slots without a resource) and per-element call counters
//! - Builders for the standard three-item base list and sequencers
//! - Event waiting helpers for timer-driven scenarios

#![allow(dead_code)]

use aplab_common::events::{AplabEvent, EventBus};
use aplab_pool::playback::media::{MediaElement, MediaHost, PlayRejection};
use aplab_pool::playback::playlist::{expand, PlaylistItem};
use aplab_pool::playback::pool::ActivationMode;
use aplab_pool::playback::sequencer::{Sequencer, SequencerSettings};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Scripted media host
// ============================================================================

#[derive(Default)]
struct Script {
    missing_slots: Mutex<HashSet<usize>>,
    rejected_calls: Mutex<HashSet<usize>>,
    play_calls: AtomicUsize,
    gestures: AtomicUsize,
    elements: Mutex<Vec<Arc<ScriptedElement>>>,
}

/// Media host whose outcomes are decided by the test
///
/// Every `play()` is allowed unless its global call index (activation cycles
/// included, counted from 0) was registered with `reject_play_call`.
#[derive(Clone, Default)]
pub struct ScriptedHost {
    script: Arc<Script>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create_element(slot)` returns None for this slot
    pub fn without_slot(self, slot: usize) -> Self {
        self.script.missing_slots.lock().unwrap().insert(slot);
        self
    }

    /// The `call`-th `play()` on this host is rejected with NotAllowed
    pub fn reject_play_call(self, call: usize) -> Self {
        self.script.rejected_calls.lock().unwrap().insert(call);
        self
    }

    pub fn shared(&self) -> Arc<dyn MediaHost> {
        Arc::new(self.clone())
    }

    /// Element bound to `slot`, if one was created
    pub fn element(&self, slot: usize) -> Option<Arc<ScriptedElement>> {
        self.script
            .elements
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.slot == slot)
            .cloned()
    }

    pub fn elements(&self) -> Vec<Arc<ScriptedElement>> {
        self.script.elements.lock().unwrap().clone()
    }

    pub fn play_calls(&self) -> usize {
        self.script.play_calls.load(Ordering::SeqCst)
    }

    pub fn gestures(&self) -> usize {
        self.script.gestures.load(Ordering::SeqCst)
    }

    /// Number of elements currently rendering
    pub fn unpaused_count(&self) -> usize {
        self.elements().iter().filter(|e| !e.is_paused()).count()
    }
}

impl MediaHost for ScriptedHost {
    fn create_element(&self, slot_index: usize) -> Option<Arc<dyn MediaElement>> {
        if self.script.missing_slots.lock().unwrap().contains(&slot_index) {
            return None;
        }
        let element = Arc::new(ScriptedElement {
            slot: slot_index,
            script: Arc::clone(&self.script),
            state: Mutex::new(ElementState {
                paused: true,
                ..ElementState::default()
            }),
        });
        self.script
            .elements
            .lock()
            .unwrap()
            .push(Arc::clone(&element));
        Some(element)
    }

    fn grant_user_activation(&self) {
        self.script.gestures.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct ElementState {
    source: Option<String>,
    paused: bool,
    position_secs: f64,
    loads: usize,
    plays: usize,
}

pub struct ScriptedElement {
    slot: usize,
    script: Arc<Script>,
    state: Mutex<ElementState>,
}

impl std::fmt::Debug for ScriptedElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedElement")
            .field("slot", &self.slot)
            .field("state", &self.state)
            .finish()
    }
}

impl ScriptedElement {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().unwrap().loads
    }

    pub fn play_count(&self) -> usize {
        self.state.lock().unwrap().plays
    }

    pub fn position_secs(&self) -> f64 {
        self.state.lock().unwrap().position_secs
    }
}

#[async_trait]
impl MediaElement for ScriptedElement {
    fn source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    fn set_source(&self, source: &str) {
        self.state.lock().unwrap().source = Some(source.to_string());
    }

    fn load(&self) {
        let mut state = self.state.lock().unwrap();
        state.loads += 1;
        state.position_secs = 0.0;
    }

    fn seek(&self, position_secs: f64) {
        self.state.lock().unwrap().position_secs = position_secs;
    }

    fn pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        let call = self.script.play_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.plays += 1;

        if self.script.rejected_calls.lock().unwrap().contains(&call) {
            return Err(PlayRejection::NotAllowed(format!("scripted rejection of call {}", call)));
        }
        if state.source.is_none() {
            return Err(PlayRejection::NotSupported("no source".to_string()));
        }
        state.paused = false;
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn base_items() -> Vec<PlaylistItem> {
    vec![
        PlaylistItem::new("https://media.test/ForBiggerEscapes.mp4", "Escapes", 15),
        PlaylistItem::new("https://media.test/ForBiggerJoyrides.mp4", "Joyrides", 15),
        PlaylistItem::new("https://media.test/ForBiggerMeltdowns.mp4", "Meltdowns", 15),
    ]
}

pub fn pooled_settings(pool_size: usize) -> SequencerSettings {
    SequencerSettings {
        pool_size,
        interval_seconds: 1,
        settle_delay: Duration::from_millis(100),
        activation: ActivationMode::Sequential,
    }
}

/// Base list whose locators carry the slow-proxy `delay` parameter
pub fn slow_items(delay_ms: u64) -> Vec<PlaylistItem> {
    ["Escapes", "Joyrides", "Meltdowns"]
        .iter()
        .map(|name| {
            PlaylistItem::new(
                format!("/api/video?name={}&delay={}", name, delay_ms),
                *name,
                15,
            )
        })
        .collect()
}

/// Sequencer over the standard base list expanded to `playlist_length`
pub fn sequencer_with(
    host: Arc<dyn MediaHost>,
    playlist_length: usize,
    settings: SequencerSettings,
) -> Sequencer {
    sequencer_over(host, &base_items(), playlist_length, settings)
}

/// Sequencer over `base` expanded to `playlist_length`
pub fn sequencer_over(
    host: Arc<dyn MediaHost>,
    base: &[PlaylistItem],
    playlist_length: usize,
    settings: SequencerSettings,
) -> Sequencer {
    Sequencer::new(
        expand(base, playlist_length),
        settings,
        host,
        EventBus::new(1024),
    )
    .expect("valid sequencer settings")
}

// ============================================================================
// Event helpers
// ============================================================================

/// Receive events until one matches `pred`; returns it
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<AplabEvent>, mut pred: F) -> AplabEvent
where
    F: FnMut(&AplabEvent) -> bool,
{
    loop {
        let event = rx.recv().await.expect("event bus closed or lagged");
        if pred(&event) {
            return event;
        }
    }
}

/// Drain everything already queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<AplabEvent>) -> Vec<AplabEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
