//! Error taxonomy of the download engine.
//!
//! Every failed run ends in exactly one `DownloadError`, which the task maps to
//! the stable `ErrorCode` handed to `DownloadListener::on_fail`.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::progress_store::PersistenceError;
use crate::transport::TransportError;

/// Stable failure code delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Network, persistence or local file failure; retry with `resume`.
    Generic,
    /// The target volume cannot hold the remaining bytes.
    SpaceInsufficient,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::Generic => -1,
            ErrorCode::SpaceInsufficient => -2,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Generic => write!(f, "generic error"),
            ErrorCode::SpaceInsufficient => write!(f, "insufficient space"),
        }
    }
}

/// The local target file could not be prepared or is not what it should be.
#[derive(Debug, thiserror::Error)]
pub enum LocalFileStateError {
    #[error("open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("allocate {len} bytes for {}: {source}", .path.display())]
    Allocate {
        path: PathBuf,
        len: u64,
        source: io::Error,
    },
    #[error("sync {}: {source}", .path.display())]
    Sync { path: PathBuf, source: io::Error },
    #[error("{} is missing after download", .path.display())]
    Missing { path: PathBuf },
    #[error("{} has {actual} bytes, expected {expected}", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Failure of a single segment worker.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server answered the range request with an unexpected status.
    #[error("range request returned HTTP {0}")]
    Http(u32),
    /// Positioned write into the target file failed (disk full, permissions).
    #[error("storage: {0}")]
    Storage(#[source] io::Error),
    /// Transfer ended before the range was filled (server closed early).
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    ShortBody { expected: u64, received: u64 },
}

/// Terminal failure of one run of a download task.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("metadata probe failed: {0}")]
    Probe(#[source] TransportError),
    #[error("segment {index} failed: {source}")]
    Segment {
        index: usize,
        #[source]
        source: SegmentError,
    },
    #[error("not enough free space in {} for {required} bytes", .dir.display())]
    SpaceInsufficient { dir: PathBuf, required: u64 },
    #[error(transparent)]
    LocalFile(#[from] LocalFileStateError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("segment worker panicked: {0}")]
    WorkerPanicked(String),
}

impl DownloadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DownloadError::SpaceInsufficient { .. } => ErrorCode::SpaceInsufficient,
            _ => ErrorCode::Generic,
        }
    }

    /// Recoverable failures leave the task paused; the rest mark it failed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DownloadError::SpaceInsufficient { .. } | DownloadError::LocalFile(_)
        )
    }
}
