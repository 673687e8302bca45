use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::exercise::Exercise;
use crate::model::ids::{LevelId, ProgramId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgramError {
    #[error("program name cannot be empty")]
    EmptyName,

    #[error("level name cannot be empty")]
    EmptyLevelName,

    #[error("program {0} has no levels")]
    NoLevels(ProgramId),

    #[error("level {0} has no exercises")]
    NoExercises(LevelId),

    #[error("duplicate level id {0}")]
    DuplicateLevel(LevelId),
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// One stage of a program: an ordered list of exercises plus the XP it pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    id: LevelId,
    name: String,
    xp_reward: u32,
    exercises: Vec<Exercise>,
}

impl Level {
    /// Creates a validated level.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::EmptyLevelName` or `ProgramError::NoExercises`.
    pub fn new(
        id: LevelId,
        name: impl Into<String>,
        xp_reward: u32,
        exercises: Vec<Exercise>,
    ) -> Result<Self, ProgramError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ProgramError::EmptyLevelName);
        }
        if exercises.is_empty() {
            return Err(ProgramError::NoExercises(id));
        }
        Ok(Self {
            id,
            name,
            xp_reward,
            exercises,
        })
    }

    #[must_use]
    pub fn id(&self) -> &LevelId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn xp_reward(&self) -> u32 {
        self.xp_reward
    }

    #[must_use]
    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    #[must_use]
    pub fn exercise(&self, index: usize) -> Option<&Exercise> {
        self.exercises.get(index)
    }

    /// Total number of sets across all exercises.
    #[must_use]
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(Exercise::set_count).sum()
    }
}

//
// ─── PROGRAM ───────────────────────────────────────────────────────────────────
//

/// Static, read-only workout program.
///
/// Loaded from the persistence collaborator and never mutated by a session.
/// `unlocks` lists the programs that open up once the final level is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    id: ProgramId,
    name: String,
    levels: Vec<Level>,
    #[serde(default)]
    unlocks: Vec<ProgramId>,
}

impl Program {
    /// Creates a validated program.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError` for a blank name, no levels, or duplicate level ids.
    pub fn new(
        id: ProgramId,
        name: impl Into<String>,
        levels: Vec<Level>,
        unlocks: Vec<ProgramId>,
    ) -> Result<Self, ProgramError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ProgramError::EmptyName);
        }
        if levels.is_empty() {
            return Err(ProgramError::NoLevels(id));
        }

        let mut seen = HashSet::with_capacity(levels.len());
        for level in &levels {
            if !seen.insert(level.id()) {
                return Err(ProgramError::DuplicateLevel(level.id().clone()));
            }
        }

        Ok(Self {
            id,
            name,
            levels,
            unlocks,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ProgramId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[must_use]
    pub fn unlocks(&self) -> &[ProgramId] {
        &self.unlocks
    }

    #[must_use]
    pub fn level(&self, id: &LevelId) -> Option<&Level> {
        self.levels.iter().find(|level| level.id() == id)
    }

    #[must_use]
    pub fn level_index(&self, id: &LevelId) -> Option<usize> {
        self.levels.iter().position(|level| level.id() == id)
    }

    /// Returns true if `id` names the final level of this program.
    #[must_use]
    pub fn is_last_level(&self, id: &LevelId) -> bool {
        self.levels.last().is_some_and(|level| level.id() == id)
    }
}
