#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quest_core::Clock;
pub use sessions as session;

pub use error::SessionError;
pub use sessions::{
    FinishedWorkout, ManualTickSource, RestState, SessionEngine, SessionProgress, SessionState,
    SetOutcome, TickSource, TokioTickSource, WorkoutLoopService,
};
