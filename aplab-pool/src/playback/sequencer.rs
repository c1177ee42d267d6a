//! Sequencer: drives a run through the extended playlist
//!
//! ```text
//! Idle ──start()──► Activating ──settled──► Running ──last step──► Succeeded
//!                                              │
//!                                              └──blocked/unavailable──► Failed
//! any ──reset()──► Idle
//! ```
//!
//! Every step runs as a task scheduled by [`StepTimer`]. A step schedules its
//! successor only after its own play resolved, so at most one step is ever
//! pending. `reset()` bumps the run generation; a completion that carries a
//! stale generation applies nothing.

use aplab_common::events::{AplabEvent, EventBus, RunState};
use aplab_common::time::{duration_to_millis, now};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assignment::{self, slot_for};
use super::log::{EntryOutcome, PlaybackLog, PlaybackLogEntry};
use super::media::MediaHost;
use super::playlist::{ExtendedPlaylist, PlaylistItem, ResolvedItem};
use super::pool::{
    slot_name, ActivateOutcome, ActivationMode, PrepareOutcome, ResourcePool, SlotActivation,
};
use super::timer::StepTimer;
use crate::error::{Error, Result};
use crate::state::{PlanRow, RunSnapshot};

/// Accepted range for the step interval, in seconds
pub const INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=10;

/// Fixed parameters of a sequencer
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerSettings {
    /// Number of pool slots (K)
    pub pool_size: usize,
    /// Initial step interval; adjustable between runs
    pub interval_seconds: u32,
    /// Pause between the end of activation and step 0
    pub settle_delay: Duration,
    pub activation: ActivationMode,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            pool_size: 3,
            interval_seconds: 1,
            settle_delay: Duration::from_millis(100),
            activation: ActivationMode::Sequential,
        }
    }
}

/// Mutable run bookkeeping, guarded by one lock
///
/// The log lives here so that the generation check and the append happen
/// under the same guard.
#[derive(Debug, Default)]
struct RunCore {
    state: RunState,
    generation: u64,
    interval_seconds: u32,
    run_id: Option<Uuid>,
    started_at: Option<Instant>,
    current_position: Option<usize>,
    activations: Vec<SlotActivation>,
    log: PlaybackLog,
}

impl RunCore {
    fn elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|at| duration_to_millis(at.elapsed()))
            .unwrap_or(0)
    }

    fn is_current(&self, generation: u64, expected: RunState) -> bool {
        self.generation == generation && self.state == expected
    }
}

struct Inner {
    playlist: ExtendedPlaylist,
    settings: SequencerSettings,
    pool: ResourcePool,
    host: Arc<dyn MediaHost>,
    core: RwLock<RunCore>,
    timer: StepTimer,
    events: EventBus,
}

/// Handle to the run driver
///
/// Cheap to clone; every clone drives the same run.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

impl Sequencer {
    /// Build a sequencer over `playlist` with a pool of `settings.pool_size` slots
    ///
    /// The pool is created empty; elements are requested from `host` when a
    /// run starts.
    pub fn new(
        playlist: ExtendedPlaylist,
        settings: SequencerSettings,
        host: Arc<dyn MediaHost>,
        events: EventBus,
    ) -> Result<Self> {
        if settings.pool_size == 0 {
            return Err(Error::InvalidInput("pool size must be at least 1".to_string()));
        }
        if settings.pool_size > playlist.len() {
            return Err(Error::InvalidInput(format!(
                "pool size {} exceeds playlist length {}",
                settings.pool_size,
                playlist.len()
            )));
        }
        if !INTERVAL_RANGE.contains(&settings.interval_seconds) {
            return Err(Error::InvalidInput(format!(
                "interval must be within {}..={} seconds, got {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end(),
                settings.interval_seconds
            )));
        }

        let core = RunCore {
            interval_seconds: settings.interval_seconds,
            ..RunCore::default()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                pool: ResourcePool::new(settings.pool_size),
                playlist,
                settings,
                host,
                core: RwLock::new(core),
                timer: StepTimer::new(),
                events,
            }),
        })
    }

    /// Begin a run (the user gesture)
    ///
    /// Only allowed from `Idle`; a finished run must be reset first.
    /// User activation is granted to the host here, at call time, so the
    /// activation phase runs inside the gesture's window.
    pub async fn start(&self) -> Result<Uuid> {
        let mut core = self.inner.core.write().await;
        if core.state != RunState::Idle {
            return Err(Error::InvalidState(format!(
                "cannot start while {}; reset first",
                core.state
            )));
        }

        core.generation += 1;
        core.log.clear();
        core.activations.clear();
        core.current_position = None;
        core.started_at = Some(Instant::now());
        let run_id = Uuid::new_v4();
        core.run_id = Some(run_id);
        self.inner.transition(&mut core, RunState::Activating);

        info!(
            "Run {} started: {} positions on {} slots, {}s interval",
            run_id,
            self.inner.playlist.len(),
            self.inner.settings.pool_size,
            core.interval_seconds
        );

        // Scheduled under the lock so a concurrent reset() always cancels it
        self.inner.host.grant_user_activation();
        self.inner.timer.schedule_next(
            Duration::ZERO,
            Inner::activation_phase(Arc::clone(&self.inner), core.generation),
        );
        Ok(run_id)
    }

    /// Stop everything and return to `Idle`
    ///
    /// Cancels the pending step, stops every slot and clears the log.
    /// Callable from any state.
    ///
    /// The core lock is held until the timer is cancelled and the pool is
    /// stopped, so a `start()` racing this call only ever sees the finished
    /// reset.
    pub async fn reset(&self) {
        {
            let mut core = self.inner.core.write().await;
            core.generation += 1;
            core.log.clear();
            core.activations.clear();
            core.current_position = None;
            core.started_at = None;
            core.run_id = None;

            self.inner.timer.cancel();
            self.inner.pool.stop_all().await;
            self.inner.transition(&mut core, RunState::Idle);
        }

        info!("Run reset");
        self.inner.events.emit_lossy(AplabEvent::RunReset {
            timestamp: now(),
        });
    }

    /// Change the step interval for the next run
    pub async fn set_interval_seconds(&self, seconds: u32) -> Result<()> {
        let mut core = self.inner.core.write().await;
        if core.state.is_in_progress() {
            return Err(Error::InvalidState(format!(
                "interval is locked while {}",
                core.state
            )));
        }
        if !INTERVAL_RANGE.contains(&seconds) {
            return Err(Error::InvalidInput(format!(
                "interval must be within {}..={} seconds, got {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end(),
                seconds
            )));
        }

        if core.interval_seconds != seconds {
            core.interval_seconds = seconds;
            info!("Step interval set to {}s", seconds);
            self.inner.events.emit_lossy(AplabEvent::IntervalChanged {
                seconds,
                timestamp: now(),
            });
        }
        Ok(())
    }

    pub async fn state(&self) -> RunState {
        self.inner.core.read().await.state
    }

    pub async fn interval_seconds(&self) -> u32 {
        self.inner.core.read().await.interval_seconds
    }

    /// Copy of the playback log
    pub async fn log(&self) -> Vec<PlaybackLogEntry> {
        self.inner.core.read().await.log.entries().to_vec()
    }

    /// Per-slot activation results of the current run
    pub async fn activations(&self) -> Vec<SlotActivation> {
        self.inner.core.read().await.activations.clone()
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        let core = self.inner.core.read().await;
        let slots = self.inner.pool.snapshot().await;
        RunSnapshot {
            run_id: core.run_id,
            state: core.state,
            interval_seconds: core.interval_seconds,
            current_position: core.current_position,
            playlist_length: self.inner.playlist.len(),
            pool_size: self.inner.settings.pool_size,
            activation: self.inner.settings.activation,
            elapsed_ms: core.started_at.map(|_| core.elapsed_ms()),
            slots,
            activations: core.activations.clone(),
            log_length: core.log.len(),
        }
    }

    /// Where every position of the playlist plays
    pub fn plan(&self) -> Vec<PlanRow> {
        let playlist = &self.inner.playlist;
        let pool_size = self.inner.settings.pool_size;
        (0..playlist.len())
            .filter_map(|position| {
                let resolved = playlist.resolve(position, pool_size)?;
                let assignment = assignment::assign(position, pool_size, playlist.base().len());
                Some(PlanRow {
                    position,
                    label: resolved.label,
                    slot_index: assignment.slot_index,
                    slot_name: slot_name(assignment.slot_index),
                    source_index: assignment.source_index,
                    source_label: resolved.item.label,
                    source: resolved.item.source,
                })
            })
            .collect()
    }

    pub fn playlist(&self) -> &ExtendedPlaylist {
        &self.inner.playlist
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.inner.settings
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.inner.pool
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether a step (or the activation phase) is scheduled and not yet done
    pub fn has_pending_step(&self) -> bool {
        self.inner.timer.is_pending()
    }

    /// Wait until the run leaves the in-progress states
    ///
    /// Returns the state reached: `Succeeded`, `Failed`, or `Idle` after a
    /// reset.
    pub async fn wait_for_finish(&self) -> RunState {
        let mut rx = self.inner.events.subscribe();
        loop {
            let state = self.state().await;
            if !state.is_in_progress() {
                return state;
            }
            if let Err(tokio::sync::broadcast::error::RecvError::Closed) = rx.recv().await {
                return self.state().await;
            }
        }
    }
}

impl Inner {
    /// Apply a state transition and announce it
    fn transition(&self, core: &mut RunCore, new_state: RunState) {
        let old_state = core.state;
        if old_state == new_state {
            return;
        }
        core.state = new_state;
        info!("Run state: {} → {}", old_state, new_state);
        self.events.emit_lossy(AplabEvent::RunStateChanged {
            old_state,
            new_state,
            timestamp: now(),
        });
    }

    fn activation_phase(self: Arc<Self>, generation: u64) -> BoxFuture<'static, ()> {
        async move { self.run_activation(generation).await }.boxed()
    }

    fn step(self: Arc<Self>, position: usize, generation: u64) -> BoxFuture<'static, ()> {
        async move { self.run_step(position, generation).await }.boxed()
    }

    async fn run_activation(self: Arc<Self>, generation: u64) {
        let pool_size = self.settings.pool_size;
        let bound = self.pool.bind_all(self.host.as_ref()).await;
        debug!("{} of {} slots bound", bound, pool_size);

        let initial: Vec<Option<PlaylistItem>> = (0..pool_size)
            .map(|slot| self.playlist.resolve(slot, pool_size).map(|r| r.item))
            .collect();
        let report = self
            .pool
            .activate_all(&initial, self.settings.activation)
            .await;

        let mut core = self.core.write().await;
        if !core.is_current(generation, RunState::Activating) {
            debug!("Activation finished for a superseded run");
            return;
        }

        for activation in &report {
            self.events.emit_lossy(AplabEvent::SlotActivated {
                slot_index: activation.slot_index,
                succeeded: activation.succeeded,
                reason: activation.reason.clone(),
                timestamp: now(),
            });
        }
        let failed = report.iter().filter(|a| !a.succeeded).count();
        if failed > 0 {
            warn!("{} of {} slots failed activation", failed, report.len());
        }
        core.activations = report;

        self.transition(&mut core, RunState::Running);
        let delay = self.settings.settle_delay;
        self.timer
            .schedule_next(delay, Arc::clone(&self).step(0, generation));
        self.events.emit_lossy(AplabEvent::StepScheduled {
            position: 0,
            delay_ms: duration_to_millis(delay),
            timestamp: now(),
        });
    }

    async fn run_step(self: Arc<Self>, position: usize, generation: u64) {
        if !self
            .core
            .read()
            .await
            .is_current(generation, RunState::Running)
        {
            debug!("Step #{} dropped: run superseded", position + 1);
            return;
        }

        let pool_size = self.settings.pool_size;
        let Some(resolved) = self.playlist.resolve(position, pool_size) else {
            // Past the end of the playlist
            let mut core = self.core.write().await;
            if core.is_current(generation, RunState::Running) {
                self.pool.clear_active().await;
                self.transition(&mut core, RunState::Succeeded);
            }
            return;
        };
        let slot_index = slot_for(position, pool_size);

        let outcome = self.pool.activate(slot_index, &resolved.item).await;

        let mut core = self.core.write().await;
        if !core.is_current(generation, RunState::Running) {
            debug!("Step #{} resolved after reset; ignored", position + 1);
            return;
        }

        let entry_outcome = match &outcome {
            ActivateOutcome::Superseded => {
                debug!("Step #{} superseded by a pool stop", position + 1);
                return;
            }
            ActivateOutcome::Played { .. } => EntryOutcome::Played,
            ActivateOutcome::Blocked(rejection) => EntryOutcome::Blocked {
                reason: rejection.to_string(),
            },
            ActivateOutcome::Unavailable => EntryOutcome::Unavailable,
        };

        let elapsed_ms = core.elapsed_ms();
        let entry = PlaybackLogEntry {
            position,
            slot_index,
            content_label: resolved.label.clone(),
            source_label: resolved.item.label.clone(),
            src_was_changed: matches!(outcome, ActivateOutcome::Played { src_changed: true }),
            outcome: entry_outcome,
            elapsed_ms,
        };
        core.current_position = Some(position);

        match outcome {
            ActivateOutcome::Played { src_changed } => {
                info!("{}", entry);
                core.log.record(entry);
                self.events.emit_lossy(AplabEvent::PlaybackStarted {
                    position,
                    slot_index,
                    label: resolved.label.clone(),
                    source_label: resolved.item.label.clone(),
                    src_changed,
                    elapsed_ms,
                    timestamp: now(),
                });

                let next = position + 1;
                match self.playlist.resolve(next, pool_size) {
                    Some(upcoming) => {
                        self.prepare_upcoming(&upcoming).await;
                        let delay = Duration::from_secs(u64::from(core.interval_seconds));
                        self.timer
                            .schedule_next(delay, Arc::clone(&self).step(next, generation));
                        self.events.emit_lossy(AplabEvent::StepScheduled {
                            position: next,
                            delay_ms: duration_to_millis(delay),
                            timestamp: now(),
                        });
                    }
                    None => {
                        self.pool.clear_active().await;
                        self.transition(&mut core, RunState::Succeeded);
                    }
                }
            }
            ActivateOutcome::Blocked(rejection) => {
                warn!("{}", entry);
                core.log.record(entry);
                self.events.emit_lossy(AplabEvent::PlaybackBlocked {
                    position,
                    slot_index,
                    label: resolved.label.clone(),
                    reason: rejection.to_string(),
                    elapsed_ms,
                    timestamp: now(),
                });
                self.transition(&mut core, RunState::Failed);
            }
            ActivateOutcome::Unavailable => {
                warn!("{}", entry);
                core.log.record(entry);
                self.events.emit_lossy(AplabEvent::ResourceUnavailable {
                    position,
                    slot_index,
                    timestamp: now(),
                });
                self.transition(&mut core, RunState::Failed);
            }
            ActivateOutcome::Superseded => {}
        }
    }

    /// Bind the next position's content to its (idle) slot ahead of time
    async fn prepare_upcoming(&self, upcoming: &ResolvedItem) {
        let slot_index = slot_for(upcoming.position, self.settings.pool_size);
        let outcome = self
            .pool
            .prepare(slot_index, &upcoming.item, upcoming.position)
            .await;

        match outcome {
            PrepareOutcome::Loaded | PrepareOutcome::AlreadyBound => {
                self.events.emit_lossy(AplabEvent::SlotPrepared {
                    slot_index,
                    position: upcoming.position,
                    label: upcoming.label.clone(),
                    reloaded: outcome == PrepareOutcome::Loaded,
                    timestamp: now(),
                });
            }
            PrepareOutcome::Busy => {
                debug!(
                    "Slot {} still playing; {} binds at its step",
                    slot_name(slot_index),
                    upcoming.label
                );
            }
            PrepareOutcome::Unavailable => {
                debug!("Slot {} unavailable for {}", slot_name(slot_index), upcoming.label);
            }
        }
    }
}
