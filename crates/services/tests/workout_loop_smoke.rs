use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use quest_core::model::{
    Exercise, ExerciseId, ExerciseKind, Level, LevelId, Program, ProgramId, UserId,
};
use quest_core::time::fixed_now;
use quest_core::{Clock, EngineSettings};
use services::{
    ManualTickSource, RestState, SessionEngine, SessionError, SetOutcome, TokioTickSource,
    WorkoutLoopService,
};
use storage::repository::{
    InMemoryRepository, ProgramRepository, SessionId, SessionRecord, SessionRepository,
    SessionRow, StaticIdentity, StorageError, UserRepository,
};

fn build_program() -> Program {
    let squats =
        Exercise::new(ExerciseId::new("squat"), "Squats", ExerciseKind::Reps, 2, 10, 20).unwrap();
    let wall_sit =
        Exercise::new(ExerciseId::new("wall-sit"), "Wall sit", ExerciseKind::Time, 1, 40, 0)
            .unwrap();
    let intro = Level::new(LevelId::new("intro"), "Intro", 100, vec![squats.clone()]).unwrap();
    let final_level =
        Level::new(LevelId::new("final"), "Final", 200, vec![squats, wall_sit]).unwrap();
    Program::new(
        ProgramId::new("legs"),
        "Leg Day",
        vec![intro, final_level],
        vec![ProgramId::new("legs-2")],
    )
    .unwrap()
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.upsert_program(&build_program()).await.unwrap();
    repo
}

fn loop_service(repo: &InMemoryRepository, user: Option<UserId>) -> WorkoutLoopService {
    let identity = match user {
        Some(user) => StaticIdentity::signed_in(user),
        None => StaticIdentity::signed_out(),
    };
    WorkoutLoopService::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(identity),
    )
}

fn manual_engine() -> (SessionEngine, ManualTickSource) {
    let ticks = ManualTickSource::new();
    let engine = SessionEngine::new(EngineSettings::default(), Arc::new(ticks.clone()))
        .with_clock(Clock::fixed(fixed_now()));
    (engine, ticks)
}

#[tokio::test]
async fn workout_loop_persists_session_and_credits_xp() {
    let repo = seeded_repo().await;
    let user = UserId::new("alice");
    let svc = loop_service(&repo, Some(user.clone()));
    let (mut engine, ticks) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("final"))
        .await
        .unwrap();

    assert_eq!(
        engine.record_set(10).unwrap(),
        SetOutcome::Resting { duration_secs: 20 }
    );
    ticks.advance(20);
    assert_eq!(engine.rest_state(), RestState::Idle);
    assert_eq!(
        engine.record_set(10).unwrap(),
        SetOutcome::AdvancedExercise { exercise_index: 1 }
    );
    assert!(matches!(
        engine.record_set(40).unwrap(),
        SetOutcome::Completed { .. }
    ));

    let finished = svc.finish_workout(&mut engine).await.unwrap();
    assert_eq!(finished.result.score(), 1000);
    assert_eq!(finished.result.xp_earned(), 300);
    assert!(finished.result.program_completed());
    assert_eq!(
        finished.result.unlocked_programs(),
        &[ProgramId::new("legs-2")]
    );
    assert_eq!(finished.xp.total_xp, 300);
    assert_eq!(finished.xp.previous_level, 1);
    assert_eq!(finished.xp.new_level, 3);
    assert!(!engine.is_active());

    let saved = repo.get_session(finished.session_id).await.unwrap();
    assert_eq!(saved.user_id, user);
    assert_eq!(saved.result, finished.result);
}

#[tokio::test]
async fn failed_level_still_saves_but_unlocks_nothing() {
    let repo = seeded_repo().await;
    let user = UserId::new("bob");
    let svc = loop_service(&repo, Some(user.clone()));
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(7).unwrap();
    engine.record_set_input("not a number").unwrap();

    let finished = svc.finish_workout(&mut engine).await.unwrap();
    assert_eq!(finished.result.score(), 350);
    assert!(!finished.result.level_completed());
    assert!(finished.result.unlocked_programs().is_empty());
    assert_eq!(finished.xp.total_xp, 100);
    assert_eq!(repo.list_sessions(&user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_program_is_a_storage_error() {
    let repo = seeded_repo().await;
    let svc = loop_service(&repo, Some(UserId::new("alice")));
    let (mut engine, _) = manual_engine();

    let err = svc
        .start_workout(&mut engine, &ProgramId::new("arms"), &LevelId::new("intro"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Storage(StorageError::NotFound)));
    assert!(!engine.is_active());
}

#[tokio::test]
async fn finishing_requires_signed_in_user() {
    let repo = seeded_repo().await;
    let svc = loop_service(&repo, None);
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(10).unwrap();
    engine.record_set(10).unwrap();

    let err = svc.finish_workout(&mut engine).await.unwrap_err();
    assert!(matches!(err, SessionError::Unauthenticated));
    assert!(engine.is_complete());
}

#[tokio::test]
async fn finishing_unfinished_workout_fails() {
    let repo = seeded_repo().await;
    let svc = loop_service(&repo, Some(UserId::new("alice")));
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(10).unwrap();

    let err = svc.finish_workout(&mut engine).await.unwrap_err();
    assert!(matches!(err, SessionError::NotComplete));
}

/// Session store that fails the next `remaining_failures` saves.
struct FlakySessions {
    inner: InMemoryRepository,
    remaining_failures: AtomicU32,
    attempts: AtomicU32,
}

#[async_trait]
impl SessionRepository for FlakySessions {
    async fn save_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StorageError::Connection("offline".into()));
        }
        self.inner.save_session(record).await
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        self.inner.get_session(id).await
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionRow>, StorageError> {
        self.inner.list_sessions(user_id).await
    }
}

/// XP store that fails the first update only.
struct FlakyUsers {
    inner: InMemoryRepository,
    failed_once: AtomicU32,
}

#[async_trait]
impl UserRepository for FlakyUsers {
    async fn update_user_xp(
        &self,
        user_id: &UserId,
        delta: u32,
    ) -> Result<quest_core::progression::PlayerProgress, StorageError> {
        if self.failed_once.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StorageError::Conflict);
        }
        self.inner.update_user_xp(user_id, delta).await
    }

    async fn user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<quest_core::progression::PlayerProgress, StorageError> {
        self.inner.user_progress(user_id).await
    }
}

#[tokio::test]
async fn retry_after_save_failure_reproduces_result() {
    let repo = seeded_repo().await;
    let user = UserId::new("carol");
    let sessions = Arc::new(FlakySessions {
        inner: repo.clone(),
        remaining_failures: AtomicU32::new(1),
        attempts: AtomicU32::new(0),
    });
    let svc = WorkoutLoopService::new(
        Arc::new(repo.clone()),
        sessions.clone(),
        Arc::new(repo.clone()),
        Arc::new(StaticIdentity::signed_in(user.clone())),
    );
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(9).unwrap();
    engine.record_set(9).unwrap();
    let expected = engine.complete_session(None).unwrap();

    let err = svc.finish_workout(&mut engine).await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(StorageError::Connection(_))));
    assert!(engine.is_complete());

    let finished = svc.finish_workout(&mut engine).await.unwrap();
    assert_eq!(finished.result, expected);
    assert_eq!(sessions.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(repo.list_sessions(&user).await.unwrap().len(), 1);
    assert_eq!(repo.user_progress(&user).await.unwrap().total_xp(), 125);
}

#[tokio::test]
async fn retry_after_xp_failure_does_not_save_twice() {
    let repo = seeded_repo().await;
    let user = UserId::new("dana");
    let svc = WorkoutLoopService::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(FlakyUsers {
            inner: repo.clone(),
            failed_once: AtomicU32::new(0),
        }),
        Arc::new(StaticIdentity::signed_in(user.clone())),
    );
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(10).unwrap();
    engine.record_set(10).unwrap();

    assert!(svc.finish_workout(&mut engine).await.is_err());
    let finished = svc.finish_workout(&mut engine).await.unwrap();

    let sessions = repo.list_sessions(&user).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, finished.session_id);
    assert_eq!(finished.xp.total_xp, 150);
}

#[tokio::test(start_paused = true)]
async fn tokio_ticks_drive_rest_countdown() {
    let finished = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&finished);
    let mut engine = SessionEngine::new(
        EngineSettings::default(),
        Arc::new(TokioTickSource::try_current().unwrap()),
    )
    .with_rest_listener(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    engine
        .start(Arc::new(build_program()), &LevelId::new("intro"))
        .unwrap();
    engine.record_set(10).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5_500)).await;
    assert_eq!(engine.rest_state(), RestState::Resting { remaining_secs: 15 });

    tokio::time::sleep(std::time::Duration::from_secs(15)).await;
    assert_eq!(engine.rest_state(), RestState::Idle);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn saved_attempt_cannot_be_rescored_before_retry() {
    let repo = seeded_repo().await;
    let user = UserId::new("erin");
    let svc = WorkoutLoopService::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(FlakyUsers {
            inner: repo.clone(),
            failed_once: AtomicU32::new(0),
        }),
        Arc::new(StaticIdentity::signed_in(user.clone())),
    );
    let (mut engine, _) = manual_engine();

    svc.start_workout(&mut engine, &ProgramId::new("legs"), &LevelId::new("intro"))
        .await
        .unwrap();
    engine.record_set(5).unwrap();
    engine.record_set(5).unwrap();

    let err = svc.finish_workout(&mut engine).await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(StorageError::Conflict)));

    let err = engine
        .complete_session(Some(vec![vec![10, 10]]))
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyCompleted));

    let finished = svc.finish_workout(&mut engine).await.unwrap();
    assert_eq!(finished.result.score(), 500);
    let saved = repo.get_session(finished.session_id).await.unwrap();
    assert_eq!(saved.result, finished.result);
    assert_eq!(finished.xp.total_xp, 100);
    assert_eq!(repo.list_sessions(&user).await.unwrap().len(), 1);
}
