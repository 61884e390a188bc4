//! In-process progress store. Nothing survives the process; useful for
//! one-shot downloads and tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::key::FileKey;

use super::{DownloadFlag, FlagRecord, PersistenceError, ProgressRecord, ProgressStore};

#[derive(Debug, Default, Clone)]
struct Entry {
    flag: Option<FlagRecord>,
    downloaded_length: u64,
    segment_offsets: Vec<u64>,
}

/// `ProgressStore` backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    entries: Mutex<BTreeMap<(String, String), Entry>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<(String, String), Entry>) -> T,
    ) -> Result<T, PersistenceError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Backend("memory store poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

fn map_key(key: &FileKey) -> (String, String) {
    (key.path_str(), key.url().to_string())
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn query_flag(&self, key: &FileKey) -> Result<Option<FlagRecord>, PersistenceError> {
        self.with_entries(|m| m.get(&map_key(key)).and_then(|e| e.flag))
    }

    async fn insert_flag(
        &self,
        key: &FileKey,
        flag: DownloadFlag,
        total_length: u64,
    ) -> Result<(), PersistenceError> {
        self.with_entries(|m| {
            m.entry(map_key(key)).or_default().flag = Some(FlagRecord { flag, total_length });
        })
    }

    async fn update_flag(&self, key: &FileKey, flag: DownloadFlag) -> Result<(), PersistenceError> {
        self.with_entries(|m| {
            if let Some(record) = m.get_mut(&map_key(key)).and_then(|e| e.flag.as_mut()) {
                record.flag = flag;
            }
        })
    }

    async fn query_downloaded_length(&self, key: &FileKey) -> Result<u64, PersistenceError> {
        self.with_entries(|m| m.get(&map_key(key)).map(|e| e.downloaded_length).unwrap_or(0))
    }

    async fn query_segment_offsets(&self, key: &FileKey) -> Result<Vec<u64>, PersistenceError> {
        self.with_entries(|m| {
            m.get(&map_key(key))
                .map(|e| e.segment_offsets.clone())
                .unwrap_or_default()
        })
    }

    async fn update_download_length(
        &self,
        key: &FileKey,
        downloaded_length: u64,
        segment_offsets: &[u64],
    ) -> Result<(), PersistenceError> {
        self.with_entries(|m| {
            let entry = m.entry(map_key(key)).or_default();
            entry.downloaded_length = downloaded_length;
            entry.segment_offsets = segment_offsets.to_vec();
        })
    }

    async fn delete(&self, key: &FileKey) -> Result<(), PersistenceError> {
        self.with_entries(|m| {
            m.remove(&map_key(key));
        })
    }

    async fn list(&self) -> Result<Vec<ProgressRecord>, PersistenceError> {
        self.with_entries(|m| {
            m.iter()
                .filter_map(|((path, url), e)| {
                    let flag = e.flag?;
                    Some(ProgressRecord {
                        key: FileKey::new(path.clone(), url.clone()),
                        flag: flag.flag,
                        total_length: flag.total_length,
                        downloaded_length: e.downloaded_length,
                        segment_offsets: e.segment_offsets.clone(),
                    })
                })
                .collect()
        })
    }
}
