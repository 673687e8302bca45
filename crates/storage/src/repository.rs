use async_trait::async_trait;
use quest_core::model::{CompletionResult, Program, ProgramId, UserId};
use quest_core::progression::PlayerProgress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Identifier handed back by the backend for a saved workout session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted shape of a finished workout: who did it and how it scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub result: CompletionResult,
}

/// A stored session together with its backend id.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: SessionId,
    pub record: SessionRecord,
}

/// Read access to static program definitions.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Persist or replace a program definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the program cannot be stored.
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError>;

    /// Fetch a program by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn load_program(&self, id: &ProgramId) -> Result<Program, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Append a finished session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError>;

    /// All sessions for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sessions cannot be read.
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionRow>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Add `delta` XP to the user's lifetime total and return the new progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update cannot be applied.
    async fn update_user_xp(&self, user_id: &UserId, delta: u32)
    -> Result<PlayerProgress, StorageError>;

    /// Current progress; users with no XP yet start at zero.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if progress cannot be read.
    async fn user_progress(&self, user_id: &UserId) -> Result<PlayerProgress, StorageError>;
}

/// The signed-in user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Identity provider returning a fixed user, mostly for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserId>,
}

impl StaticIdentity {
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    programs: Arc<Mutex<HashMap<ProgramId, Program>>>,
    sessions: Arc<Mutex<Vec<SessionRow>>>,
    xp: Arc<Mutex<HashMap<UserId, PlayerProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl ProgramRepository for InMemoryRepository {
    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        let mut guard = lock(&self.programs)?;
        guard.insert(program.id().clone(), program.clone());
        Ok(())
    }

    async fn load_program(&self, id: &ProgramId) -> Result<Program, StorageError> {
        let guard = lock(&self.programs)?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn save_session(&self, record: &SessionRecord) -> Result<SessionId, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let id = SessionId::new_v4();
        guard.push(SessionRow {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionRecord, StorageError> {
        let guard = lock(&self.sessions)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.record.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionRow>, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard
            .iter()
            .filter(|row| &row.record.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn update_user_xp(
        &self,
        user_id: &UserId,
        delta: u32,
    ) -> Result<PlayerProgress, StorageError> {
        let mut guard = lock(&self.xp)?;
        let progress = guard.entry(user_id.clone()).or_default();
        progress.apply_xp(delta);
        Ok(*progress)
    }

    async fn user_progress(&self, user_id: &UserId) -> Result<PlayerProgress, StorageError> {
        let guard = lock(&self.xp)?;
        Ok(guard.get(user_id).copied().unwrap_or_default())
    }
}

/// Aggregates the collaborator contracts behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub programs: Arc<dyn ProgramRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Storage {
    /// In-memory storage with `identity` as the signed-in user source.
    #[must_use]
    pub fn in_memory(identity: Arc<dyn IdentityProvider>) -> Self {
        let repo = InMemoryRepository::new();
        let programs: Arc<dyn ProgramRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self {
            programs,
            sessions,
            users,
            identity,
        }
    }
}
