//! Decide whether a local target can be resumed or must start over.
//!
//! Each check returns a value instead of aborting the deploy; the caller
//! deletes the stored record on `LocalState::Stale` and starts fresh.

use std::fmt;

use crate::progress_store::FlagRecord;
use crate::segmenter::{clamp_offsets, plan_segments, Segment};

/// Everything persisted for one key, read before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StoredState {
    pub flag: Option<FlagRecord>,
    pub downloaded_length: u64,
    pub segment_offsets: Vec<u64>,
}

/// Why stored progress cannot be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StaleReason {
    MissingFile,
    TotalLengthChanged { recorded: u64, remote: u64 },
    FileSizeMismatch { expected: u64, actual: u64 },
    OffsetsMismatch,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingFile => write!(f, "local file is missing"),
            StaleReason::TotalLengthChanged { recorded, remote } => {
                write!(f, "remote length changed from {recorded} to {remote}")
            }
            StaleReason::FileSizeMismatch { expected, actual } => {
                write!(f, "local file has {actual} bytes, expected {expected}")
            }
            StaleReason::OffsetsMismatch => write!(f, "segment offsets do not add up"),
        }
    }
}

/// Outcome of the local file check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LocalState {
    /// Nothing stored for this key.
    Fresh,
    /// Stored progress exists but does not match the file or the remote.
    Stale(StaleReason),
    /// Continue from the stored offsets.
    Resume {
        segments: Vec<Segment>,
        offsets: Vec<u64>,
        downloaded_length: u64,
    },
}

/// Compare the stored record with the local file and the probed length.
pub(crate) fn check_local_state(
    stored: &StoredState,
    file_len: Option<u64>,
    remote_total: u64,
) -> LocalState {
    let Some(flag) = stored.flag else {
        return LocalState::Fresh;
    };
    let Some(actual) = file_len else {
        return LocalState::Stale(StaleReason::MissingFile);
    };
    if flag.total_length != remote_total {
        return LocalState::Stale(StaleReason::TotalLengthChanged {
            recorded: flag.total_length,
            remote: remote_total,
        });
    }
    if actual != remote_total {
        return LocalState::Stale(StaleReason::FileSizeMismatch {
            expected: remote_total,
            actual,
        });
    }
    if stored.segment_offsets.is_empty() {
        return LocalState::Stale(StaleReason::OffsetsMismatch);
    }

    let segments = plan_segments(remote_total, stored.segment_offsets.len());
    match clamp_offsets(&segments, &stored.segment_offsets) {
        Some(offsets)
            if offsets == stored.segment_offsets
                && offsets.iter().sum::<u64>() == stored.downloaded_length =>
        {
            LocalState::Resume {
                segments,
                offsets,
                downloaded_length: stored.downloaded_length,
            }
        }
        _ => LocalState::Stale(StaleReason::OffsetsMismatch),
    }
}
