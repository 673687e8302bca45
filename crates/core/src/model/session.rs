use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Level, LevelId, Program, ProgramId};
use crate::progression::{StatGains, calculate_stat_gains};
use crate::scoring::{
    ExerciseResult, calculate_workout_score, calculate_xp_bonus, is_level_completed,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("expected values for {expected} exercises, got {found}")]
    ExerciseCountMismatch { expected: usize, found: usize },

    #[error("exercise {index} expects {expected} set values, got {found}")]
    SetCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Scored outcome of one workout attempt, ready to hand to persistence.
///
/// Evaluation is a pure function of the program, level, recorded values, and the
/// two timestamps, so re-evaluating the same inputs always yields an equal result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    program_id: ProgramId,
    level_id: LevelId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    exercises: Vec<ExerciseResult>,
    score: u32,
    percentage: f64,
    xp_earned: u32,
    level_completed: bool,
    program_completed: bool,
    unlocked_programs: Vec<ProgramId>,
    stat_gains: StatGains,
}

impl CompletionResult {
    /// Scores `values` (one inner list per exercise, one entry per set) against `level`.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::InvalidTimeRange` if `completed_at < started_at`, or a
    /// shape mismatch when `values` does not line up with the level's exercises and sets.
    pub fn evaluate(
        program: &Program,
        level: &Level,
        values: &[Vec<u32>],
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, CompletionError> {
        if completed_at < started_at {
            return Err(CompletionError::InvalidTimeRange);
        }
        check_shape(level, values)?;

        let exercises: Vec<ExerciseResult> = level
            .exercises()
            .iter()
            .zip(values)
            .map(|(exercise, sets)| ExerciseResult {
                exercise_id: exercise.id().clone(),
                kind: exercise.kind(),
                target: exercise.total_target(),
                actual: sets.iter().fold(0_u32, |sum, v| sum.saturating_add(*v)),
            })
            .collect();

        let score = calculate_workout_score(&exercises);
        let level_completed = is_level_completed(score.score);
        let program_completed = level_completed && program.is_last_level(level.id());
        let unlocked_programs = if program_completed {
            program.unlocks().to_vec()
        } else {
            Vec::new()
        };
        let stat_gains = calculate_stat_gains(&exercises, level_completed);

        Ok(Self {
            program_id: program.id().clone(),
            level_id: level.id().clone(),
            started_at,
            completed_at,
            exercises,
            score: score.score,
            percentage: score.percentage,
            xp_earned: calculate_xp_bonus(score.score, level.xp_reward()),
            level_completed,
            program_completed,
            unlocked_programs,
            stat_gains,
        })
    }

    #[must_use]
    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    #[must_use]
    pub fn level_id(&self) -> &LevelId {
        &self.level_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn exercises(&self) -> &[ExerciseResult] {
        &self.exercises
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn xp_earned(&self) -> u32 {
        self.xp_earned
    }

    #[must_use]
    pub fn level_completed(&self) -> bool {
        self.level_completed
    }

    #[must_use]
    pub fn program_completed(&self) -> bool {
        self.program_completed
    }

    #[must_use]
    pub fn unlocked_programs(&self) -> &[ProgramId] {
        &self.unlocked_programs
    }

    #[must_use]
    pub fn stat_gains(&self) -> StatGains {
        self.stat_gains
    }

    /// Wall-clock length of the attempt in whole seconds.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        self.completed_at
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

fn check_shape(level: &Level, values: &[Vec<u32>]) -> Result<(), CompletionError> {
    let exercises = level.exercises();
    if exercises.len() != values.len() {
        return Err(CompletionError::ExerciseCountMismatch {
            expected: exercises.len(),
            found: values.len(),
        });
    }
    for (index, (exercise, sets)) in exercises.iter().zip(values).enumerate() {
        if exercise.set_count() != sets.len() {
            return Err(CompletionError::SetCountMismatch {
                index,
                expected: exercise.set_count(),
                found: sets.len(),
            });
        }
    }
    Ok(())
}
