use std::sync::Arc;

use tracing::info;

use quest_core::model::{CompletionResult, LevelId, Program, ProgramId};
use quest_core::progression::XpUpdate;
use storage::repository::{
    IdentityProvider, ProgramRepository, SessionId, SessionRecord, SessionRepository, Storage,
    UserRepository,
};

use super::engine::SessionEngine;
use crate::error::SessionError;

/// Result of finishing and persisting a workout.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedWorkout {
    pub session_id: SessionId,
    pub result: CompletionResult,
    pub xp: XpUpdate,
}

/// Orchestrates program loading, session persistence, and XP crediting around an engine.
#[derive(Clone)]
pub struct WorkoutLoopService {
    programs: Arc<dyn ProgramRepository>,
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
}

impl WorkoutLoopService {
    #[must_use]
    pub fn new(
        programs: Arc<dyn ProgramRepository>,
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            programs,
            sessions,
            users,
            identity,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(
            Arc::clone(&storage.programs),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.users),
            Arc::clone(&storage.identity),
        )
    }

    /// Load the program and start `level_id` on `engine`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the program cannot be loaded, or any
    /// error from `SessionEngine::start`.
    pub async fn start_workout(
        &self,
        engine: &mut SessionEngine,
        program_id: &ProgramId,
        level_id: &LevelId,
    ) -> Result<Arc<Program>, SessionError> {
        let program = Arc::new(self.programs.load_program(program_id).await?);
        engine.start(Arc::clone(&program), level_id)?;
        Ok(program)
    }

    /// Score the finished attempt, save it, and credit XP to the signed-in user.
    ///
    /// Safe to call again after a storage failure: a session that was already
    /// saved is not saved twice, and XP is credited at most once. On success the
    /// engine is reset.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unauthenticated` without a signed-in user,
    /// `SessionError::NotStarted` / `SessionError::NotComplete` for an unfinished
    /// attempt, and `SessionError::Storage` for persistence failures.
    pub async fn finish_workout(
        &self,
        engine: &mut SessionEngine,
    ) -> Result<FinishedWorkout, SessionError> {
        let user_id = self
            .identity
            .current_user()
            .ok_or(SessionError::Unauthenticated)?;
        let result = engine.complete_session(None)?;

        let state = engine.state_mut().ok_or(SessionError::NotStarted)?;

        let session_id = match state.saved_session_id() {
            Some(id) => id,
            None => {
                let record = SessionRecord {
                    user_id: user_id.clone(),
                    result: result.clone(),
                };
                let id = self.sessions.save_session(&record).await?;
                state.set_saved_session_id(id);
                info!(session = %id, user = %user_id, "workout saved");
                id
            }
        };

        let xp = match state.credited_xp() {
            Some(update) => update,
            None => {
                let progress = self.users.user_progress(&user_id).await?;
                let previous_level = progress.player_level();
                let updated = self
                    .users
                    .update_user_xp(&user_id, result.xp_earned())
                    .await?;
                let update = XpUpdate {
                    previous_level,
                    new_level: updated.player_level(),
                    total_xp: updated.total_xp(),
                };
                state.set_credited_xp(update);
                info!(
                    user = %user_id,
                    xp = result.xp_earned(),
                    total_xp = update.total_xp,
                    leveled_up = update.leveled_up(),
                    "xp credited"
                );
                update
            }
        };

        engine.reset();

        Ok(FinishedWorkout {
            session_id,
            result,
            xp,
        })
    }
}
