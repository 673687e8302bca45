use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use quest_core::model::{CompletionResult, Exercise, Level, LevelId, Program};
use quest_core::progression::XpUpdate;
use quest_core::{Clock, EngineSettings, InputPolicy};
use storage::repository::SessionId;

use super::progress::SessionProgress;
use super::rest_timer::{RestListener, RestState, RestTimer};
use super::tick::TickSource;
use crate::error::SessionError;

//
// ─── SET OUTCOME ───────────────────────────────────────────────────────────────
//

/// What the engine did after a set was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Next set is in the same exercise; a rest of `duration_secs` has begun.
    Resting { duration_secs: u32 },
    /// Moved on to the first set of the exercise at `exercise_index`, without rest.
    AdvancedExercise { exercise_index: usize },
    /// That was the last set of the last exercise.
    Completed { recorded_values: Vec<Vec<u32>> },
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Mutable state of one workout attempt.
///
/// `recorded_values[i]` always has exactly `sets` entries for exercise `i`.
/// `exercise_index == exercises.len()` marks the attempt as finished.
pub struct SessionState {
    program: Arc<Program>,
    level_index: usize,
    exercise_index: usize,
    set_index: usize,
    recorded_values: Vec<Vec<u32>>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    scored: bool,
    saved_session_id: Option<SessionId>,
    credited_xp: Option<XpUpdate>,
}

impl SessionState {
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[must_use]
    pub fn level(&self) -> &Level {
        &self.program.levels()[self.level_index]
    }

    #[must_use]
    pub fn exercise_index(&self) -> usize {
        self.exercise_index
    }

    #[must_use]
    pub fn set_index(&self) -> usize {
        self.set_index
    }

    #[must_use]
    pub fn recorded_values(&self) -> &[Vec<u32>] {
        &self.recorded_values
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.exercise_index >= self.level().exercises().len()
    }

    /// Whether `complete_session` has produced this attempt's result.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.scored
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.level().exercise(self.exercise_index)
    }

    /// Backend id once the completion result has been saved.
    #[must_use]
    pub fn saved_session_id(&self) -> Option<SessionId> {
        self.saved_session_id
    }

    #[must_use]
    pub fn credited_xp(&self) -> Option<XpUpdate> {
        self.credited_xp
    }

    pub(crate) fn set_saved_session_id(&mut self, id: SessionId) {
        self.saved_session_id = Some(id);
    }

    pub(crate) fn set_credited_xp(&mut self, update: XpUpdate) {
        self.credited_xp = Some(update);
    }

    fn progress(&self) -> SessionProgress {
        let exercises = self.level().exercises();
        let sets_recorded = if self.is_complete() {
            self.level().total_sets()
        } else {
            exercises[..self.exercise_index]
                .iter()
                .map(Exercise::set_count)
                .sum::<usize>()
                + self.set_index
        };
        SessionProgress {
            exercise_index: self.exercise_index,
            set_index: self.set_index,
            total_exercises: exercises.len(),
            sets_recorded,
            total_sets: self.level().total_sets(),
            is_complete: self.is_complete(),
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("program_id", self.program.id())
            .field("level_id", self.level().id())
            .field("exercise_index", &self.exercise_index)
            .field("set_index", &self.set_index)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("scored", &self.scored)
            .field("saved_session_id", &self.saved_session_id)
            .finish_non_exhaustive()
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Drives a single workout attempt: set cursor, rest countdown, and scoring.
///
/// The engine holds at most one attempt. `start` replaces it, `reset` discards it,
/// and both cancel any running rest countdown first.
pub struct SessionEngine {
    settings: EngineSettings,
    clock: Clock,
    timer: RestTimer,
    session: Option<SessionState>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(settings: EngineSettings, ticks: Arc<dyn TickSource>) -> Self {
        let timer = RestTimer::new(ticks, settings.tick_interval());
        Self {
            settings,
            clock: Clock::default(),
            timer,
            session: None,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Called whenever a rest countdown runs out by itself.
    #[must_use]
    pub fn with_rest_listener(mut self, listener: RestListener) -> Self {
        self.timer.set_listener(Some(listener));
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub(crate) fn state_mut(&mut self) -> Option<&mut SessionState> {
        self.session.as_mut()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.as_ref().is_some_and(SessionState::is_complete)
    }

    #[must_use]
    pub fn rest_state(&self) -> RestState {
        self.timer.state()
    }

    #[must_use]
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.session.as_ref().and_then(SessionState::current_exercise)
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        self.session.as_ref().map(SessionState::progress)
    }

    /// Begin a fresh attempt at `level_id` of `program`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::LevelNotFound`, `SessionError::EmptyLevel`, or
    /// `SessionError::InvalidExercise` when the level cannot be run. The previous
    /// attempt is discarded either way.
    pub fn start(&mut self, program: Arc<Program>, level_id: &LevelId) -> Result<(), SessionError> {
        // The previous attempt's countdown dies even if this start fails.
        self.timer.cancel();
        self.session = None;

        let (level_index, level) = program
            .levels()
            .iter()
            .enumerate()
            .find(|(_, level)| level.id() == level_id)
            .ok_or_else(|| SessionError::LevelNotFound(level_id.clone()))?;

        if level.exercises().is_empty() {
            return Err(SessionError::EmptyLevel(level_id.clone()));
        }
        if let Some(exercise) = level.exercises().iter().find(|e| e.sets() == 0) {
            return Err(SessionError::InvalidExercise(exercise.id().clone()));
        }

        let recorded_values: Vec<Vec<u32>> = level
            .exercises()
            .iter()
            .map(|exercise| vec![0; exercise.set_count()])
            .collect();
        let started_at = self.clock.now();

        info!(
            program = %program.id(),
            level = %level_id,
            exercises = recorded_values.len(),
            "workout started"
        );

        self.session = Some(SessionState {
            program,
            level_index,
            exercise_index: 0,
            set_index: 0,
            recorded_values,
            started_at,
            completed_at: None,
            scored: false,
            saved_session_id: None,
            credited_xp: None,
        });
        Ok(())
    }

    /// Record `value` for the current set and advance the cursor.
    ///
    /// Negative values and values beyond `u32::MAX` follow the configured
    /// `InputPolicy`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` / `SessionError::AlreadyCompleted` for a
    /// missing or finished attempt, and `SessionError::InvalidValue` when the
    /// policy is `Reject` and `value` is out of range.
    pub fn record_set(&mut self, value: i64) -> Result<SetOutcome, SessionError> {
        self.ensure_recordable()?;
        let value = self.normalize(value, &value.to_string())?;
        self.apply_set(value)
    }

    /// Like `record_set`, for raw text input; non-numeric text follows the `InputPolicy`.
    ///
    /// # Errors
    ///
    /// See `record_set`.
    pub fn record_set_input(&mut self, input: &str) -> Result<SetOutcome, SessionError> {
        self.ensure_recordable()?;
        let value = match input.trim().parse::<i64>() {
            Ok(value) => self.normalize(value, input)?,
            Err(_) => self.coerce_or_reject(input)?,
        };
        self.apply_set(value)
    }

    /// End the current rest immediately. Does nothing when already idle.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` if no attempt is active.
    pub fn skip_rest(&mut self) -> Result<(), SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NotStarted);
        }
        if self.timer.cancel() {
            debug!("rest skipped");
        }
        Ok(())
    }

    /// Score the attempt.
    ///
    /// With `None`, the recorded values are scored and every set must have been
    /// recorded. With `Some(values)`, the caller's edited values replace the
    /// recorded ones and the attempt is finalized as-is. Once scored, the attempt
    /// only accepts repeat calls with `None` or the same values, and those return
    /// equal results.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted`, `SessionError::NotComplete`,
    /// `SessionError::AlreadyCompleted` for different values after scoring, or
    /// `SessionError::Completion` when `values` do not match the level's shape.
    pub fn complete_session(
        &mut self,
        final_values: Option<Vec<Vec<u32>>>,
    ) -> Result<CompletionResult, SessionError> {
        let Some(state) = self.session.as_mut() else {
            return Err(SessionError::NotStarted);
        };

        let values = match final_values {
            Some(values) if state.scored && values != state.recorded_values => {
                warn!("attempt already scored; ignoring edited values");
                return Err(SessionError::AlreadyCompleted);
            }
            Some(values) => values,
            None if state.is_complete() => state.recorded_values.clone(),
            None => return Err(SessionError::NotComplete),
        };
        let completed_at = state.completed_at.unwrap_or_else(|| self.clock.now());

        let result = CompletionResult::evaluate(
            &state.program,
            state.level(),
            &values,
            state.started_at,
            completed_at,
        )?;

        self.timer.cancel();
        state.completed_at = Some(completed_at);
        state.scored = true;
        state.exercise_index = state.level().exercises().len();
        state.set_index = 0;
        state.recorded_values = values;

        info!(
            program = %result.program_id(),
            level = %result.level_id(),
            score = result.score(),
            xp = result.xp_earned(),
            level_completed = result.level_completed(),
            "workout scored"
        );
        Ok(result)
    }

    /// Discard the attempt and cancel any rest countdown.
    pub fn reset(&mut self) {
        self.timer.cancel();
        if self.session.take().is_some() {
            debug!("workout session discarded");
        }
    }

    fn ensure_recordable(&self) -> Result<(), SessionError> {
        match &self.session {
            None => Err(SessionError::NotStarted),
            Some(state) if state.is_complete() => Err(SessionError::AlreadyCompleted),
            Some(_) => Ok(()),
        }
    }

    fn normalize(&self, value: i64, raw: &str) -> Result<u32, SessionError> {
        match u32::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => self.coerce_or_reject(raw),
        }
    }

    fn coerce_or_reject(&self, raw: &str) -> Result<u32, SessionError> {
        match self.settings.input_policy() {
            InputPolicy::Coerce => {
                warn!(input = raw, "coercing invalid set value to 0");
                Ok(0)
            }
            InputPolicy::Reject => Err(SessionError::InvalidValue {
                input: raw.to_owned(),
            }),
        }
    }

    fn apply_set(&mut self, value: u32) -> Result<SetOutcome, SessionError> {
        let Some(state) = self.session.as_mut() else {
            return Err(SessionError::NotStarted);
        };

        // Input during a rest ends that rest.
        self.timer.cancel();

        let exercise_count = state.level().exercises().len();
        let (set_count, rest_secs) = {
            let exercise = state
                .current_exercise()
                .ok_or(SessionError::AlreadyCompleted)?;
            (exercise.set_count(), exercise.rest_secs())
        };

        let (exercise_index, set_index) = (state.exercise_index, state.set_index);
        if let Some(slot) = state
            .recorded_values
            .get_mut(exercise_index)
            .and_then(|sets| sets.get_mut(set_index))
        {
            *slot = value;
        }
        debug!(exercise_index, set_index, value, "set recorded");

        let is_last_set = set_index + 1 == set_count;
        let is_last_exercise = exercise_index + 1 == exercise_count;

        if is_last_set && is_last_exercise {
            state.exercise_index = exercise_count;
            state.set_index = 0;
            state.completed_at = Some(self.clock.now());
            info!("all sets recorded");
            return Ok(SetOutcome::Completed {
                recorded_values: state.recorded_values.clone(),
            });
        }

        if is_last_set {
            // No rest between exercises.
            state.exercise_index += 1;
            state.set_index = 0;
            return Ok(SetOutcome::AdvancedExercise {
                exercise_index: state.exercise_index,
            });
        }

        state.set_index += 1;
        let duration_secs = self.settings.effective_rest(rest_secs);
        self.timer.begin(duration_secs);
        Ok(SetOutcome::Resting { duration_secs })
    }
}

impl fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("settings", &self.settings)
            .field("rest", &self.timer.state())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
