//! Pure scoring rules for a finished workout.
//!
//! Nothing here holds state; the session engine feeds in per-exercise totals and
//! gets back a score, the pass/fail verdict, and the XP payout.

use serde::{Deserialize, Serialize};

use crate::model::{ExerciseId, ExerciseKind};

/// Highest attainable score.
pub const MAX_SCORE: u32 = 1000;

/// Score at or above which a level counts as passed.
pub const LEVEL_COMPLETION_THRESHOLD: u32 = 800;

/// Score at or above which XP is multiplied by 1.25.
pub const BONUS_TIER_SCORE: u32 = 900;

/// Score at or above which XP is multiplied by 1.5.
pub const TOP_TIER_SCORE: u32 = 950;

//
// ─── INPUT / OUTPUT ────────────────────────────────────────────────────────────
//

/// Target vs. actual totals for one exercise, summed over all its sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub exercise_id: ExerciseId,
    pub kind: ExerciseKind,
    pub target: u32,
    pub actual: u32,
}

impl ExerciseResult {
    /// Actual value counted toward the score; anything beyond target is ignored.
    #[must_use]
    pub fn credited(&self) -> u32 {
        self.actual.min(self.target)
    }

    #[must_use]
    pub fn reached_target(&self) -> bool {
        self.actual >= self.target
    }
}

/// Score on the 0–1000 scale plus the raw completion percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutScore {
    pub score: u32,
    pub percentage: f64,
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Computes the workout score from per-exercise totals.
///
/// Every exercise, reps or time, contributes at most its target. A workout with
/// no target at all scores zero.
///
/// ```
/// # use quest_core::model::{ExerciseId, ExerciseKind};
/// # use quest_core::scoring::{calculate_workout_score, ExerciseResult};
/// let score = calculate_workout_score(&[ExerciseResult {
///     exercise_id: ExerciseId::new("push-ups"),
///     kind: ExerciseKind::Reps,
///     target: 10,
///     actual: 8,
/// }]);
/// assert_eq!(score.score, 800);
/// ```
#[must_use]
pub fn calculate_workout_score(exercises: &[ExerciseResult]) -> WorkoutScore {
    let mut total_target = 0_u64;
    let mut total_actual = 0_u64;

    for exercise in exercises {
        match exercise.kind {
            ExerciseKind::Reps | ExerciseKind::Time => {
                total_target += u64::from(exercise.target);
                total_actual += u64::from(exercise.credited());
            }
        }
    }

    if total_target == 0 {
        return WorkoutScore {
            score: 0,
            percentage: 0.0,
        };
    }

    // Integer round-half-up of actual / target * 1000, so the score never
    // depends on float representation of the percentage.
    let scaled = (total_actual * u64::from(MAX_SCORE) * 2 + total_target) / (total_target * 2);
    let score = u32::try_from(scaled.min(u64::from(MAX_SCORE))).unwrap_or(MAX_SCORE);

    #[allow(clippy::cast_precision_loss)]
    let percentage = total_actual as f64 / total_target as f64 * 100.0;

    WorkoutScore { score, percentage }
}

/// Pass/fail gate for progression, stat gains, and unlocks.
#[must_use]
pub fn is_level_completed(score: u32) -> bool {
    score >= LEVEL_COMPLETION_THRESHOLD
}

/// Applies the tiered XP multiplier to `base_xp`.
///
/// - `score >= 950`: ×1.5
/// - `score >= 900`: ×1.25
/// - otherwise: ×1.0
///
/// Fractions round half up.
#[must_use]
pub fn calculate_xp_bonus(score: u32, base_xp: u32) -> u32 {
    let base = u64::from(base_xp);
    let xp = if score >= TOP_TIER_SCORE {
        (base * 3 + 1) / 2
    } else if score >= BONUS_TIER_SCORE {
        (base * 5 + 2) / 4
    } else {
        base
    };
    u32::try_from(xp).unwrap_or(u32::MAX)
}
