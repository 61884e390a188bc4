//! Persistent per-file download progress.
//!
//! Two logical records per `FileKey`: a flag record (`flag`, `total_length`)
//! and a progress record (`downloaded_length` plus per-segment resume
//! offsets). The store is the only source of truth for resuming a download
//! after a restart.

mod error;
mod memory;
mod sqlite;
mod types;

use async_trait::async_trait;

use crate::key::FileKey;

pub use error::PersistenceError;
pub use memory::MemoryProgressStore;
pub use sqlite::SqliteProgressStore;
pub use types::{DownloadFlag, FlagRecord, ProgressRecord};

/// Keyed persistence contract used by download tasks.
///
/// Implementations must give read-your-writes consistency within one process.
/// A successful `update_download_length` is trusted on the next start.
#[async_trait]
pub trait ProgressStore: Send + Sync + 'static {
    async fn query_flag(&self, key: &FileKey) -> Result<Option<FlagRecord>, PersistenceError>;

    /// Create (or replace) the flag record for `key`.
    async fn insert_flag(
        &self,
        key: &FileKey,
        flag: DownloadFlag,
        total_length: u64,
    ) -> Result<(), PersistenceError>;

    /// Change the flag of an existing record. No-op if there is none.
    async fn update_flag(&self, key: &FileKey, flag: DownloadFlag) -> Result<(), PersistenceError>;

    /// Persisted downloaded length, 0 when nothing is stored.
    async fn query_downloaded_length(&self, key: &FileKey) -> Result<u64, PersistenceError>;

    /// Persisted per-segment resume offsets, empty when nothing is stored.
    async fn query_segment_offsets(&self, key: &FileKey) -> Result<Vec<u64>, PersistenceError>;

    /// Store the aggregate length together with the offsets it is the sum of.
    async fn update_download_length(
        &self,
        key: &FileKey,
        downloaded_length: u64,
        segment_offsets: &[u64],
    ) -> Result<(), PersistenceError>;

    /// Remove both records for `key`.
    async fn delete(&self, key: &FileKey) -> Result<(), PersistenceError>;

    /// Every stored download, ordered by path then URL.
    async fn list(&self) -> Result<Vec<ProgressRecord>, PersistenceError>;
}
