mod engine;
mod progress;
mod rest_timer;
mod tick;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{SessionEngine, SessionState, SetOutcome};
pub use progress::SessionProgress;
pub use rest_timer::{RestListener, RestState};
pub use tick::{
    ManualTickSource, TickCallback, TickControl, TickHandle, TickSource, TokioTickSource,
};
pub use workflow::{FinishedWorkout, WorkoutLoopService};
