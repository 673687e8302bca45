#![forbid(unsafe_code)]

pub mod repository;

pub use repository::{
    IdentityProvider, InMemoryRepository, ProgramRepository, SessionId, SessionRecord,
    SessionRepository, SessionRow, StaticIdentity, Storage, StorageError, UserRepository,
};
