mod exercise;
mod ids;
mod program;
mod session;

pub use exercise::{Exercise, ExerciseError, ExerciseKind};
pub use ids::{ExerciseId, IdParseError, LevelId, ProgramId, UserId};
pub use program::{Level, Program, ProgramError};
pub use session::{CompletionError, CompletionResult};
