//! Types stored by the progress store.

use std::str::FromStr;

use crate::key::FileKey;

use super::PersistenceError;

/// Lifecycle stage of a download as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFlag {
    NotStarted,
    InProgress,
    Error,
    Finished,
}

impl DownloadFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadFlag::NotStarted => "not_started",
            DownloadFlag::InProgress => "in_progress",
            DownloadFlag::Error => "error",
            DownloadFlag::Finished => "finished",
        }
    }

}

impl FromStr for DownloadFlag {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(DownloadFlag::NotStarted),
            "in_progress" => Ok(DownloadFlag::InProgress),
            "error" => Ok(DownloadFlag::Error),
            "finished" => Ok(DownloadFlag::Finished),
            other => Err(PersistenceError::Corrupt(format!("unknown flag {other:?}"))),
        }
    }
}

/// Flag record: lifecycle stage and resolved content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRecord {
    pub flag: DownloadFlag,
    pub total_length: u64,
}

/// Both records for one key, joined. Used by `sdm status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub key: FileKey,
    pub flag: DownloadFlag,
    pub total_length: u64,
    pub downloaded_length: u64,
    pub segment_offsets: Vec<u64>,
}
