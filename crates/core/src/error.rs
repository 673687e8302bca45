use thiserror::Error;

use crate::model::{CompletionError, ExerciseError, IdParseError, ProgramError};
use crate::settings::SettingsError;

/// Aggregate of every domain error raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Id(#[from] IdParseError),
}
