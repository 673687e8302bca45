use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::MissedTickBehavior;

/// Whether a repeating tick should keep firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Callback run on every tick.
pub type TickCallback = Box<dyn FnMut() -> TickControl + Send + 'static>;

/// Schedules repeating ticks.
///
/// Implementations must stop calling the callback once it returns
/// `TickControl::Stop` or once the returned handle is cancelled or dropped.
pub trait TickSource: Send + Sync {
    fn schedule_tick(&self, interval: Duration, callback: TickCallback) -> TickHandle;
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// Cancels its tick when cancelled explicitly or dropped.
pub struct TickHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TickHandle {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

//
// ─── MANUAL ────────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct ManualTicks {
    next_id: u64,
    // `None` while the callback is being run.
    callbacks: HashMap<u64, Option<TickCallback>>,
    intervals: Vec<Duration>,
}

/// Deterministic tick source driven by `advance`.
///
/// Intervals are recorded but ignored: one `advance(1)` fires every live tick once.
#[derive(Clone, Default)]
pub struct ManualTickSource {
    inner: Arc<Mutex<ManualTicks>>,
}

impl ManualTickSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires every live tick `ticks` times.
    pub fn advance(&self, ticks: u32) {
        for _ in 0..ticks {
            let ids: Vec<u64> = {
                let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                let mut ids: Vec<u64> = guard.callbacks.keys().copied().collect();
                ids.sort_unstable();
                ids
            };
            for id in ids {
                self.fire(id);
            }
        }
    }

    fn fire(&self, id: u64) {
        let callback = {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard.callbacks.get_mut(&id).and_then(Option::take)
        };
        let Some(mut callback) = callback else {
            return;
        };

        let control = callback();

        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match control {
            TickControl::Continue => {
                // Cancelled mid-call: the slot is gone and stays gone.
                if let Some(slot) = guard.callbacks.get_mut(&id) {
                    *slot = Some(callback);
                }
            }
            TickControl::Stop => {
                guard.callbacks.remove(&id);
            }
        }
    }

    /// Ticks that are scheduled and neither stopped nor cancelled.
    #[must_use]
    pub fn live_ticks(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    /// Every interval ever requested, in order.
    #[must_use]
    pub fn scheduled_intervals(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .intervals
            .clone()
    }
}

impl TickSource for ManualTickSource {
    fn schedule_tick(&self, interval: Duration, callback: TickCallback) -> TickHandle {
        let id = {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = guard.next_id;
            guard.next_id += 1;
            guard.callbacks.insert(id, Some(callback));
            guard.intervals.push(interval);
            id
        };

        let inner = Arc::clone(&self.inner);
        TickHandle::new(move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .remove(&id);
        })
    }
}

impl fmt::Debug for ManualTickSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTickSource")
            .field("live_ticks", &self.live_ticks())
            .finish()
    }
}

//
// ─── TOKIO ─────────────────────────────────────────────────────────────────────
//

/// Wall-clock ticks on a tokio runtime; each schedule spawns one interval task.
#[derive(Debug, Clone)]
pub struct TokioTickSource {
    runtime: Handle,
}

impl TokioTickSource {
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Uses the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns `TryCurrentError` when called outside a tokio runtime.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl TickSource for TokioTickSource {
    fn schedule_tick(&self, interval: Duration, mut callback: TickCallback) -> TickHandle {
        let task = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if callback() == TickControl::Stop {
                    break;
                }
            }
        });
        TickHandle::new(move || task.abort())
    }
}
