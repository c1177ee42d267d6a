//! Simulated media host with a browser-like autoplay policy
//!
//! Policy, per `play()` call:
//! - muted elements may always play
//! - an element that played once under user activation stays allowed (sticky)
//! - otherwise the call must land inside the transient activation window
//!   opened by the last user gesture
//!
//! Loads take `default_load_ms`, or the `delay` query parameter of the
//! locator when present (the slow-network proxy used for manual testing).
//! The activation check happens when `play()` is called; the call then
//! waits for the load to finish before resolving. A `pause()` or a new
//! source/load while it waits rejects it with `AbortError`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use super::media::{MediaElement, MediaHost, PlayRejection};

/// Simulator settings (`[simulator]` in the config file)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SimulatorConfig {
    /// Lifetime of transient user activation after a gesture
    #[serde(default = "default_activation_window_ms")]
    pub activation_window_ms: u64,

    /// Load latency for locators without a `delay` parameter
    #[serde(default = "default_load_ms")]
    pub default_load_ms: u64,

    /// Create muted elements (always allowed to play)
    #[serde(default)]
    pub muted: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            activation_window_ms: default_activation_window_ms(),
            default_load_ms: default_load_ms(),
            muted: false,
        }
    }
}

fn default_activation_window_ms() -> u64 {
    5_000 // Chromium transient activation duration
}

fn default_load_ms() -> u64 {
    50
}

/// Load latency encoded in a locator's `delay` query parameter, in ms
///
/// Relative locators (`/api/video?delay=5000`) are resolved against a dummy
/// origin so both forms parse.
pub fn delay_from_locator(source: &str) -> Option<u64> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(source).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "delay")
        .and_then(|(_, value)| value.parse().ok())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct HostShared {
    config: SimulatorConfig,
    gesture_at: Mutex<Option<Instant>>,
}

impl HostShared {
    fn activation_active(&self) -> bool {
        let window = Duration::from_millis(self.config.activation_window_ms);
        match *lock(&self.gesture_at) {
            Some(at) => at.elapsed() <= window,
            None => false,
        }
    }

    fn load_latency(&self, source: &str) -> Duration {
        let ms = delay_from_locator(source).unwrap_or(self.config.default_load_ms);
        Duration::from_millis(ms)
    }
}

/// Media host whose elements follow the simulated autoplay policy
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    shared: Arc<HostShared>,
    elements: Arc<Mutex<Vec<Arc<SimulatedElement>>>>,
}

impl SimulatedHost {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            shared: Arc::new(HostShared {
                config,
                gesture_at: Mutex::new(None),
            }),
            elements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Whether a `play()` issued now would be covered by transient activation
    pub fn has_transient_activation(&self) -> bool {
        self.shared.activation_active()
    }

    /// Elements created so far, in creation order
    pub fn elements(&self) -> Vec<Arc<SimulatedElement>> {
        lock(&self.elements).clone()
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl MediaHost for SimulatedHost {
    fn create_element(&self, slot_index: usize) -> Option<Arc<dyn MediaElement>> {
        let element = Arc::new(SimulatedElement::new(slot_index, Arc::clone(&self.shared)));
        lock(&self.elements).push(Arc::clone(&element));
        Some(element)
    }

    fn grant_user_activation(&self) {
        debug!("User activation granted");
        *lock(&self.shared.gesture_at) = Some(Instant::now());
    }
}

#[derive(Debug, Default)]
struct ElementState {
    source: Option<String>,
    ready_at: Option<Instant>,
    position_secs: f64,
    paused: bool,
    sticky_activated: bool,
    /// Bumped by pause, set_source and load; a pending play compares it
    interrupts: u64,
    load_count: usize,
    play_count: usize,
}

/// Element created by [`SimulatedHost`]
#[derive(Debug)]
pub struct SimulatedElement {
    id: usize,
    muted: bool,
    host: Arc<HostShared>,
    state: Mutex<ElementState>,
}

impl SimulatedElement {
    fn new(id: usize, host: Arc<HostShared>) -> Self {
        Self {
            id,
            muted: host.config.muted,
            host,
            state: Mutex::new(ElementState {
                paused: true,
                ..ElementState::default()
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of `load()` calls so far
    pub fn load_count(&self) -> usize {
        lock(&self.state).load_count
    }

    /// Number of `play()` calls so far
    pub fn play_count(&self) -> usize {
        lock(&self.state).play_count
    }

    pub fn position_secs(&self) -> f64 {
        lock(&self.state).position_secs
    }

    pub fn is_sticky_activated(&self) -> bool {
        lock(&self.state).sticky_activated
    }
}

#[async_trait]
impl MediaElement for SimulatedElement {
    fn source(&self) -> Option<String> {
        lock(&self.state).source.clone()
    }

    fn set_source(&self, source: &str) {
        let mut state = lock(&self.state);
        state.source = Some(source.to_string());
        state.ready_at = None;
        state.position_secs = 0.0;
        state.interrupts += 1;
    }

    fn load(&self) {
        let mut state = lock(&self.state);
        state.load_count += 1;
        state.interrupts += 1;
        if let Some(source) = state.source.as_deref() {
            state.ready_at = Some(Instant::now() + self.host.load_latency(source));
        }
    }

    fn seek(&self, position_secs: f64) {
        lock(&self.state).position_secs = position_secs.max(0.0);
    }

    fn pause(&self) {
        let mut state = lock(&self.state);
        state.paused = true;
        state.interrupts += 1;
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    async fn play(&self) -> Result<(), PlayRejection> {
        let (ready_at, interrupts) = {
            let mut state = lock(&self.state);
            state.play_count += 1;

            let Some(source) = state.source.clone() else {
                return Err(PlayRejection::NotSupported(format!(
                    "element {} has no source",
                    self.id
                )));
            };

            let allowed =
                self.muted || state.sticky_activated || self.host.activation_active();
            if !allowed {
                debug!(element = self.id, "play() rejected: no user activation");
                return Err(PlayRejection::NotAllowed(
                    "play() failed because the user didn't interact with the document first"
                        .to_string(),
                ));
            }
            state.sticky_activated = true;

            // play() on an element that was never loaded starts the load itself
            let ready_at = *state
                .ready_at
                .get_or_insert_with(|| Instant::now() + self.host.load_latency(&source));
            (ready_at, state.interrupts)
        };

        tokio::time::sleep_until(ready_at).await;

        let mut state = lock(&self.state);
        if state.interrupts != interrupts {
            debug!(element = self.id, "play() interrupted before the load finished");
            return Err(PlayRejection::Aborted(
                "The play() request was interrupted by a call to pause() or a new load request"
                    .to_string(),
            ));
        }
        state.paused = false;
        Ok(())
    }
}
