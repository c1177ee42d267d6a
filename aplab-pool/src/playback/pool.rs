//! Resource pool controller
//!
//! Owns the fixed set of K reusable playback handles. Each slot keeps the
//! same handle for the lifetime of the pool; only the content it references
//! changes. Per slot:
//!
//! `Idle → Activated → (Preparing ⇄ Playing) → Idle` (on stop_all)
//!
//! The slot table lock is never held across `play().await`. A play that
//! resolves after [`ResourcePool::stop_all`] is reported as
//! [`ActivateOutcome::Superseded`] and leaves the slot table untouched.

use aplab_common::events::SlotState;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::media::{bind_source, MediaElement, MediaHost, PlayRejection};
use super::playlist::PlaylistItem;

/// How slots are activated when a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// One slot after another (pooled experiment)
    #[default]
    Sequential,
    /// All slots at once (pre-activation experiment)
    Concurrent,
    /// No play-then-pause cycle; slots stay Idle until they play (timeline experiment)
    None,
}

/// Display name of a slot: A, B, C, ...
pub fn slot_name(slot_index: usize) -> String {
    match u8::try_from(slot_index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => format!("S{}", slot_index),
    }
}

/// Result of one slot's activation cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotActivation {
    pub slot_index: usize,
    pub succeeded: bool,
    /// Rejection text when the cycle failed
    pub reason: Option<String>,
}

impl SlotActivation {
    fn ok(slot_index: usize) -> Self {
        Self {
            slot_index,
            succeeded: true,
            reason: None,
        }
    }

    fn failed(slot_index: usize, reason: impl Into<String>) -> Self {
        Self {
            slot_index,
            succeeded: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of [`ResourcePool::prepare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// New content bound and loading
    Loaded,
    /// Slot already referenced the content; nothing reloaded
    AlreadyBound,
    /// Slot is rendering right now (single-slot pool); binding waits for its step
    Busy,
    /// Slot has no playback resource
    Unavailable,
}

/// Result of [`ResourcePool::activate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateOutcome {
    /// Playback started; `src_changed` is false when the content was pre-bound
    Played { src_changed: bool },
    /// Host refused the play command
    Blocked(PlayRejection),
    /// Slot has no playback resource
    Unavailable,
    /// The pool was stopped while the play was in flight
    Superseded,
}

/// One reusable playback handle
#[derive(Debug)]
struct PoolSlot {
    handle: Option<Arc<dyn MediaElement>>,
    current: Option<PlaylistItem>,
    state: SlotState,
    /// Logical position the slot is being prepared for
    prepared_for: Option<usize>,
}

impl PoolSlot {
    fn empty() -> Self {
        Self {
            handle: None,
            current: None,
            state: SlotState::Idle,
            prepared_for: None,
        }
    }
}

/// Read-only view of one slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    pub slot_index: usize,
    pub name: String,
    pub bound: bool,
    pub state: SlotState,
    pub current_label: Option<String>,
    pub current_source: Option<String>,
    pub prepared_for: Option<usize>,
}

/// Fixed-size pool of reusable playback handles
pub struct ResourcePool {
    slots: RwLock<Vec<PoolSlot>>,
    /// Bumped by stop_all; in-flight plays compare against it on resolution
    epoch: AtomicU64,
}

impl ResourcePool {
    pub fn new(size: usize) -> Self {
        Self {
            slots: RwLock::new((0..size).map(|_| PoolSlot::empty()).collect()),
            epoch: AtomicU64::new(0),
        }
    }

    pub async fn size(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Bind one element per slot from `host`
    ///
    /// Slots that already hold an element keep it. Returns the number of
    /// slots with an element afterwards.
    pub async fn bind_all(&self, host: &dyn MediaHost) -> usize {
        let mut slots = self.slots.write().await;
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.handle.is_none() {
                slot.handle = host.create_element(index);
                if slot.handle.is_none() {
                    warn!("No playback resource for slot {}", slot_name(index));
                }
            }
        }
        slots.iter().filter(|s| s.handle.is_some()).count()
    }

    /// Play-then-pause every slot so later plays need no user activation
    ///
    /// `initial[i]` is bound to slot `i` first. A failed slot is reported
    /// and skipped; the other slots are still activated.
    pub async fn activate_all(
        &self,
        initial: &[Option<PlaylistItem>],
        mode: ActivationMode,
    ) -> Vec<SlotActivation> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let targets: Vec<(usize, Option<Arc<dyn MediaElement>>)> = {
            let mut slots = self.slots.write().await;
            slots
                .iter_mut()
                .enumerate()
                .map(|(index, slot)| {
                    if let (Some(handle), Some(Some(item))) = (&slot.handle, initial.get(index)) {
                        bind_source(handle.as_ref(), &item.source);
                        handle.seek(0.0);
                        slot.current = Some(item.clone());
                    }
                    (index, slot.handle.clone())
                })
                .collect()
        };

        if mode == ActivationMode::None {
            debug!("Activation skipped for {} slots", targets.len());
            return Vec::new();
        }

        let report = match mode {
            ActivationMode::Concurrent => {
                join_all(
                    targets
                        .into_iter()
                        .map(|(index, handle)| Self::activation_cycle(index, handle)),
                )
                .await
            }
            _ => {
                let mut report = Vec::with_capacity(targets.len());
                for (index, handle) in targets {
                    report.push(Self::activation_cycle(index, handle).await);
                }
                report
            }
        };

        let mut slots = self.slots.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Pool stopped during activation; slot states left untouched");
            return report;
        }
        for activation in report.iter().filter(|a| a.succeeded) {
            if let Some(slot) = slots.get_mut(activation.slot_index) {
                slot.state = SlotState::Activated;
            }
        }
        report
    }

    async fn activation_cycle(
        index: usize,
        handle: Option<Arc<dyn MediaElement>>,
    ) -> SlotActivation {
        let Some(element) = handle else {
            return SlotActivation::failed(index, "no playback resource bound");
        };

        match element.play().await {
            Ok(()) => {
                element.pause();
                element.seek(0.0);
                info!("Slot {} activated", slot_name(index));
                SlotActivation::ok(index)
            }
            Err(rejection) => {
                warn!("Slot {} activation failed: {}", slot_name(index), rejection);
                SlotActivation::failed(index, rejection.to_string())
            }
        }
    }

    /// Bind `item` to `slot_index` ahead of its turn
    ///
    /// Reloads only when the slot's element references other content, so
    /// calling this twice with the same item triggers at most one load.
    pub async fn prepare(
        &self,
        slot_index: usize,
        item: &PlaylistItem,
        position: usize,
    ) -> PrepareOutcome {
        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(slot_index) else {
            return PrepareOutcome::Unavailable;
        };
        let Some(handle) = slot.handle.clone() else {
            warn!("Cannot prepare slot {}: no playback resource", slot_name(slot_index));
            return PrepareOutcome::Unavailable;
        };
        if slot.state == SlotState::Playing {
            debug!("Slot {} is playing; preparation deferred", slot_name(slot_index));
            return PrepareOutcome::Busy;
        }

        let reloaded = bind_source(handle.as_ref(), &item.source);
        slot.current = Some(item.clone());
        slot.prepared_for = Some(position);
        slot.state = SlotState::Preparing;

        debug!(
            "Prepared slot {} for #{} ({}){}",
            slot_name(slot_index),
            position + 1,
            item.label,
            if reloaded { "" } else { " without reload" }
        );

        if reloaded {
            PrepareOutcome::Loaded
        } else {
            PrepareOutcome::AlreadyBound
        }
    }

    /// Hand playback over to `slot_index` with `item`
    ///
    /// Pauses the previously playing slot, rewinds, and plays. On success the
    /// slot becomes the only `Playing` slot.
    pub async fn activate(&self, slot_index: usize, item: &PlaylistItem) -> ActivateOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let (element, src_changed) = {
            let mut slots = self.slots.write().await;
            let Some(handle) = slots.get(slot_index).and_then(|s| s.handle.clone()) else {
                return ActivateOutcome::Unavailable;
            };

            for (index, other) in slots.iter().enumerate() {
                if index != slot_index && other.state == SlotState::Playing {
                    if let Some(other_handle) = &other.handle {
                        other_handle.pause();
                    }
                }
            }

            let src_changed = bind_source(handle.as_ref(), &item.source);
            handle.seek(0.0);

            let slot = &mut slots[slot_index];
            slot.current = Some(item.clone());
            slot.prepared_for = None;
            (handle, src_changed)
        };

        let result = element.play().await;

        let mut slots = self.slots.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // Reset won the race: keep the element quiet and the table untouched
            element.pause();
            return ActivateOutcome::Superseded;
        }

        for (index, slot) in slots.iter_mut().enumerate() {
            if index != slot_index && slot.state == SlotState::Playing {
                slot.state = SlotState::Activated;
            }
        }

        match result {
            Ok(()) => {
                slots[slot_index].state = SlotState::Playing;
                ActivateOutcome::Played { src_changed }
            }
            Err(rejection) => {
                let slot = &mut slots[slot_index];
                if slot.state != SlotState::Idle {
                    slot.state = SlotState::Activated;
                }
                ActivateOutcome::Blocked(rejection)
            }
        }
    }

    /// Clear Playing/Preparing flags without touching the elements
    ///
    /// Used when a run completes: the last item keeps rendering, but no slot
    /// is owned by the sequencer anymore.
    pub async fn clear_active(&self) {
        let mut slots = self.slots.write().await;
        for slot in slots.iter_mut() {
            if matches!(slot.state, SlotState::Playing | SlotState::Preparing) {
                slot.state = SlotState::Activated;
            }
            slot.prepared_for = None;
        }
    }

    /// Pause and rewind every element; every slot back to Idle
    ///
    /// Elements stay bound (and keep their source) for the next run.
    pub async fn stop_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.write().await;
        for slot in slots.iter_mut() {
            if let Some(handle) = &slot.handle {
                handle.pause();
                handle.seek(0.0);
            }
            slot.current = None;
            slot.state = SlotState::Idle;
            slot.prepared_for = None;
        }
        debug!("Pool stopped ({} slots)", slots.len());
    }

    pub async fn snapshot(&self) -> Vec<SlotSnapshot> {
        let slots = self.slots.read().await;
        slots
            .iter()
            .enumerate()
            .map(|(index, slot)| SlotSnapshot {
                slot_index: index,
                name: slot_name(index),
                bound: slot.handle.is_some(),
                state: slot.state,
                current_label: slot.current.as_ref().map(|i| i.label.clone()),
                current_source: slot.current.as_ref().map(|i| i.source.clone()),
                prepared_for: slot.prepared_for,
            })
            .collect()
    }

    /// Number of slots currently flagged Playing
    pub async fn playing_count(&self) -> usize {
        self.slots
            .read()
            .await
            .iter()
            .filter(|s| s.state == SlotState::Playing)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::simulated::{SimulatedHost, SimulatorConfig};

    fn item(label: &str) -> PlaylistItem {
        PlaylistItem::new(format!("{}.mp4", label), label, 15)
    }

    fn host() -> SimulatedHost {
        SimulatedHost::new(SimulatorConfig {
            activation_window_ms: 5_000,
            default_load_ms: 10,
            muted: false,
        })
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(slot_name(0), "A");
        assert_eq!(slot_name(2), "C");
        assert_eq!(slot_name(25), "Z");
        assert_eq!(slot_name(26), "S26");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_twice_loads_once() {
        let host = host();
        let pool = ResourcePool::new(3);
        assert_eq!(pool.bind_all(&host).await, 3);

        let escapes = item("Escapes");
        assert_eq!(pool.prepare(1, &escapes, 1).await, PrepareOutcome::Loaded);
        assert_eq!(pool.prepare(1, &escapes, 1).await, PrepareOutcome::AlreadyBound);
        assert_eq!(host.elements()[1].load_count(), 1);

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot[1].state, SlotState::Preparing);
        assert_eq!(snapshot[1].prepared_for, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_hands_over_playing_flag() {
        let host = host();
        let pool = ResourcePool::new(2);
        pool.bind_all(&host).await;
        host.grant_user_activation();

        let outcome = pool.activate(0, &item("a")).await;
        assert_eq!(outcome, ActivateOutcome::Played { src_changed: true });

        let outcome = pool.activate(1, &item("b")).await;
        assert_eq!(outcome, ActivateOutcome::Played { src_changed: true });

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot[0].state, SlotState::Activated);
        assert_eq!(snapshot[1].state, SlotState::Playing);
        assert_eq!(pool.playing_count().await, 1);
        assert!(host.elements()[0].is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_all_sequential_marks_slots_activated() {
        let host = host();
        let pool = ResourcePool::new(3);
        pool.bind_all(&host).await;
        host.grant_user_activation();

        let initial: Vec<Option<PlaylistItem>> =
            vec![Some(item("a")), Some(item("b")), Some(item("c"))];
        let report = pool.activate_all(&initial, ActivationMode::Sequential).await;

        assert_eq!(report.len(), 3);
        assert!(report.iter().all(|a| a.succeeded));
        for element in host.elements() {
            assert!(element.is_paused());
            assert!(element.is_sticky_activated());
            assert_eq!(element.position_secs(), 0.0);
        }
        let snapshot = pool.snapshot().await;
        assert!(snapshot.iter().all(|s| s.state == SlotState::Activated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_all_without_gesture_reports_each_slot() {
        let host = host();
        let pool = ResourcePool::new(2);
        pool.bind_all(&host).await;

        let initial = vec![Some(item("a")), Some(item("b"))];
        let report = pool.activate_all(&initial, ActivationMode::Concurrent).await;

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|a| !a.succeeded && a.reason.is_some()));
        let snapshot = pool.snapshot().await;
        assert!(snapshot.iter().all(|s| s.state == SlotState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_mode_none_only_binds() {
        let host = host();
        let pool = ResourcePool::new(2);
        pool.bind_all(&host).await;

        let initial = vec![Some(item("a")), Some(item("b"))];
        let report = pool.activate_all(&initial, ActivationMode::None).await;

        assert!(report.is_empty());
        assert_eq!(host.elements()[0].play_count(), 0);
        assert_eq!(host.elements()[1].source().as_deref(), Some("b.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_resets_slots() {
        let host = host();
        let pool = ResourcePool::new(1);
        pool.bind_all(&host).await;
        host.grant_user_activation();
        pool.activate(0, &item("a")).await;

        pool.stop_all().await;

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot[0].state, SlotState::Idle);
        assert!(snapshot[0].current_label.is_none());
        assert!(host.elements()[0].is_paused());
        // Element keeps its source, so the next run can skip the reload
        assert_eq!(host.elements()[0].source().as_deref(), Some("a.mp4"));
    }
}
