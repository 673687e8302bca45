use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ExerciseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise name cannot be empty")]
    EmptyName,

    #[error("exercise {id} must have at least one set")]
    NoSets { id: ExerciseId },
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// How an exercise target is measured.
///
/// - `Reps`: target counts repetitions per set
/// - `Time`: target counts seconds held per set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Reps,
    Time,
}

impl ExerciseKind {
    /// Unit label for the per-set target.
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            ExerciseKind::Reps => "reps",
            ExerciseKind::Time => "seconds",
        }
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// A single exercise inside a level: a fixed number of sets, each aiming at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    id: ExerciseId,
    name: String,
    kind: ExerciseKind,
    sets: u32,
    target: u32,
    rest_secs: u32,
}

impl Exercise {
    /// Creates a validated exercise.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::EmptyName` for a blank name and
    /// `ExerciseError::NoSets` when `sets == 0`.
    pub fn new(
        id: ExerciseId,
        name: impl Into<String>,
        kind: ExerciseKind,
        sets: u32,
        target: u32,
        rest_secs: u32,
    ) -> Result<Self, ExerciseError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ExerciseError::EmptyName);
        }
        if sets == 0 {
            return Err(ExerciseError::NoSets { id });
        }

        Ok(Self {
            id,
            name,
            kind,
            sets,
            target,
            rest_secs,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExerciseId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    #[must_use]
    pub fn sets(&self) -> u32 {
        self.sets
    }

    /// Per-set target, in reps or seconds depending on `kind`.
    #[must_use]
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Rest after each non-final set of this exercise.
    #[must_use]
    pub fn rest_secs(&self) -> u32 {
        self.rest_secs
    }

    /// Target across all sets (`sets * target`).
    #[must_use]
    pub fn total_target(&self) -> u32 {
        self.sets.saturating_mul(self.target)
    }

    /// Number of sets as a buffer length.
    #[must_use]
    pub fn set_count(&self) -> usize {
        usize::try_from(self.sets).unwrap_or(usize::MAX)
    }
}
