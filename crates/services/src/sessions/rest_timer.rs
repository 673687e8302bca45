use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::tick::{TickControl, TickHandle, TickSource};

/// Rest countdown between two sets of the same exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestState {
    Idle,
    Resting { remaining_secs: u32 },
}

impl RestState {
    #[must_use]
    pub fn is_resting(&self) -> bool {
        matches!(self, RestState::Resting { .. })
    }
}

/// Called once when a countdown runs out on its own (not when skipped).
pub type RestListener = Arc<dyn Fn() + Send + Sync>;

struct Countdown {
    state: RestState,
    // Bumped on every begin/cancel; ticks carrying an older value are ignored.
    generation: u64,
}

/// One-countdown-at-a-time rest timer.
///
/// Beginning a countdown always cancels the previous one first, so at most one
/// tick is ever live per timer.
pub struct RestTimer {
    source: Arc<dyn TickSource>,
    interval: Duration,
    shared: Arc<Mutex<Countdown>>,
    handle: Option<TickHandle>,
    listener: Option<RestListener>,
}

impl RestTimer {
    #[must_use]
    pub fn new(source: Arc<dyn TickSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            shared: Arc::new(Mutex::new(Countdown {
                state: RestState::Idle,
                generation: 0,
            })),
            handle: None,
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: Option<RestListener>) {
        self.listener = listener;
    }

    #[must_use]
    pub fn state(&self) -> RestState {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Starts a countdown of `secs`; a zero-length rest leaves the timer idle.
    pub fn begin(&mut self, secs: u32) {
        self.cancel();
        if secs == 0 {
            return;
        }

        let generation = {
            let mut countdown = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            countdown.generation += 1;
            countdown.state = RestState::Resting {
                remaining_secs: secs,
            };
            countdown.generation
        };

        let shared = Arc::clone(&self.shared);
        let listener = self.listener.clone();
        let handle = self.source.schedule_tick(
            self.interval,
            Box::new(move || tick(&shared, generation, listener.as_ref())),
        );
        self.handle = Some(handle);
        debug!(secs, generation, "rest countdown started");
    }

    /// Forces the timer idle. Returns true if a countdown was running.
    pub fn cancel(&mut self) -> bool {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        let mut countdown = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        countdown.generation += 1;
        let was_resting = countdown.state.is_resting();
        countdown.state = RestState::Idle;
        was_resting
    }
}

fn tick(shared: &Mutex<Countdown>, generation: u64, listener: Option<&RestListener>) -> TickControl {
    let mut countdown = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if countdown.generation != generation {
        warn!(
            tick_generation = generation,
            live_generation = countdown.generation,
            "dropping stale rest tick"
        );
        return TickControl::Stop;
    }

    match countdown.state {
        RestState::Resting { remaining_secs } if remaining_secs > 1 => {
            countdown.state = RestState::Resting {
                remaining_secs: remaining_secs - 1,
            };
            debug!(remaining_secs = remaining_secs - 1, "rest tick");
            TickControl::Continue
        }
        RestState::Resting { .. } => {
            countdown.state = RestState::Idle;
            drop(countdown);
            info!("rest finished");
            if let Some(listener) = listener {
                listener();
            }
            TickControl::Stop
        }
        RestState::Idle => TickControl::Stop,
    }
}

impl Drop for RestTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for RestTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTimer")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("armed", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}
