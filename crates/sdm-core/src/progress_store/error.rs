//! Persistence error type.

/// The progress store could not read or write a record.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("segment offsets: {0}")]
    Offsets(#[from] serde_json::Error),
    #[error("state directory: {0}")]
    StateDir(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// A stored row cannot be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Failure from a custom backend.
    #[error("{0}")]
    Backend(String),
}

impl PersistenceError {
    /// The record exists but is unreadable; callers drop it and start over.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, PersistenceError::Corrupt(_))
    }
}
