//! Cancellable step timer
//!
//! `schedule_next(delay, step)` is the only way the sequencer continues a
//! run. At most one scheduled step exists at a time because a step is only
//! ever scheduled from the completion of the previous one.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct StepTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl StepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `step` after `delay` on the runtime
    ///
    /// The previous handle is replaced, not aborted: when a step schedules
    /// its successor, the previous handle is the calling task itself.
    pub fn schedule_next<F>(&self, delay: Duration, step: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            step.await;
        });
        *self.pending() = Some(handle);
    }

    /// Abort the scheduled step, if any
    ///
    /// Returns true when a step had not completed yet.
    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                debug!("Pending step cancelled");
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
