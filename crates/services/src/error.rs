//! Shared error types for the services crate.

use thiserror::Error;

use quest_core::model::{CompletionError, ExerciseId, LevelId};
use storage::repository::StorageError;

/// Errors emitted by the session engine and workout loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no workout session has been started")]
    NotStarted,
    #[error("workout session already completed")]
    AlreadyCompleted,
    #[error("workout session has sets left to record")]
    NotComplete,
    #[error("invalid set value: {input:?}")]
    InvalidValue { input: String },
    #[error("level {0} not found in program")]
    LevelNotFound(LevelId),
    #[error("level {0} has no exercises")]
    EmptyLevel(LevelId),
    #[error("exercise {0} has no sets")]
    InvalidExercise(ExerciseId),
    #[error("no signed-in user")]
    Unauthenticated,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
