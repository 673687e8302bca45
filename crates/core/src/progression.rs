use serde::{Deserialize, Serialize};

use crate::model::ExerciseKind;
use crate::scoring::ExerciseResult;

/// XP step of the player level curve: level `n` starts at `XP_CURVE_STEP * n * (n - 1)`.
pub const XP_CURVE_STEP: u64 = 50;

//
// ─── STAT GAINS ────────────────────────────────────────────────────────────────
//

/// RPG-style attribute points earned by one workout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatGains {
    pub strength: u32,
    pub endurance: u32,
}

impl StatGains {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strength == 0 && self.endurance == 0
    }
}

/// Stat points for a workout.
///
/// Only a passed level pays out; each exercise that reached its target adds one
/// point to strength (reps) or endurance (time).
#[must_use]
pub fn calculate_stat_gains(exercises: &[ExerciseResult], level_completed: bool) -> StatGains {
    if !level_completed {
        return StatGains::default();
    }

    exercises
        .iter()
        .filter(|exercise| exercise.reached_target())
        .fold(StatGains::default(), |mut gains, exercise| {
            match exercise.kind {
                ExerciseKind::Reps => gains.strength += 1,
                ExerciseKind::Time => gains.endurance += 1,
            }
            gains
        })
}

//
// ─── PLAYER LEVEL ──────────────────────────────────────────────────────────────
//

/// XP needed to reach `level` (level 1 starts at 0).
#[must_use]
pub fn xp_for_level(level: u32) -> u64 {
    let n = u64::from(level.max(1));
    XP_CURVE_STEP.saturating_mul(n).saturating_mul(n - 1)
}

/// Result of crediting XP to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpUpdate {
    pub previous_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
}

impl XpUpdate {
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// Lifetime XP total for a user, as kept by the persistence collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProgress {
    total_xp: u64,
}

impl PlayerProgress {
    #[must_use]
    pub fn new(total_xp: u64) -> Self {
        Self { total_xp }
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    /// Current player level on the triangular curve.
    ///
    /// Largest `n` with `n * (n - 1) <= total_xp / XP_CURVE_STEP`, i.e.
    /// `n = (1 + isqrt(1 + 4q)) / 2`.
    #[must_use]
    pub fn player_level(&self) -> u32 {
        let q = self.total_xp / XP_CURVE_STEP;
        let level = (1 + (1 + 4 * q).isqrt()) / 2;
        u32::try_from(level).unwrap_or(u32::MAX).max(1)
    }

    /// XP still missing before the next player level.
    #[must_use]
    pub fn xp_to_next_level(&self) -> u64 {
        xp_for_level(self.player_level().saturating_add(1)).saturating_sub(self.total_xp)
    }

    /// Credits `delta` XP and reports whether the player leveled up.
    pub fn apply_xp(&mut self, delta: u32) -> XpUpdate {
        let previous_level = self.player_level();
        self.total_xp = self.total_xp.saturating_add(u64::from(delta));
        XpUpdate {
            previous_level,
            new_level: self.player_level(),
            total_xp: self.total_xp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseId;

    fn result(kind: ExerciseKind, target: u32, actual: u32) -> ExerciseResult {
        ExerciseResult {
            exercise_id: ExerciseId::new("e"),
            kind,
            target,
            actual,
        }
    }

    #[test]
    fn failed_level_grants_no_stats() {
        let gains = calculate_stat_gains(&[result(ExerciseKind::Reps, 10, 10)], false);
        assert!(gains.is_empty());
    }

    #[test]
    fn stats_follow_exercise_kind() {
        let gains = calculate_stat_gains(
            &[
                result(ExerciseKind::Reps, 10, 12),
                result(ExerciseKind::Reps, 10, 9),
                result(ExerciseKind::Time, 30, 30),
            ],
            true,
        );
        assert_eq!(
            gains,
            StatGains {
                strength: 1,
                endurance: 1
            }
        );
    }

    #[test]
    fn level_curve_boundaries() {
        assert_eq!(xp_for_level(1), 0);
        assert_eq!(xp_for_level(2), 100);
        assert_eq!(xp_for_level(3), 300);

        assert_eq!(PlayerProgress::new(0).player_level(), 1);
        assert_eq!(PlayerProgress::new(99).player_level(), 1);
        assert_eq!(PlayerProgress::new(100).player_level(), 2);
        assert_eq!(PlayerProgress::new(299).player_level(), 2);
        assert_eq!(PlayerProgress::new(300).player_level(), 3);
        assert_eq!(PlayerProgress::new(250).xp_to_next_level(), 50);
    }

    #[test]
    fn level_matches_curve_walk() {
        let mut walked = 1_u32;
        for xp in 0..5_000_u64 {
            while xp_for_level(walked + 1) <= xp {
                walked += 1;
            }
            assert_eq!(PlayerProgress::new(xp).player_level(), walked, "xp {xp}");
        }
    }

    #[test]
    fn saturated_xp_has_a_finite_level() {
        let progress = PlayerProgress::new(u64::MAX);
        let level = progress.player_level();
        assert!(level > 1);
        assert!(xp_for_level(level) <= u64::MAX / XP_CURVE_STEP * XP_CURVE_STEP);
        assert!(xp_for_level(level + 1) > u64::MAX / XP_CURVE_STEP * XP_CURVE_STEP);
    }

    #[test]
    fn apply_xp_reports_level_up() {
        let mut progress = PlayerProgress::new(80);
        let update = progress.apply_xp(25);
        assert_eq!(update.previous_level, 1);
        assert_eq!(update.new_level, 2);
        assert_eq!(update.total_xp, 105);
        assert!(update.leveled_up());

        let update = progress.apply_xp(10);
        assert!(!update.leveled_up());
    }
}
