//! Per-file download coordinator.
//!
//! A `DownloadTask` owns the state machine of one `FileKey`, partitions the
//! remote resource into segments, fans out one worker per segment and folds
//! their chunk events into a single persisted progress counter.

mod deploy;
mod state;
mod validate;
mod worker;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SdmConfig;
use crate::control::StopToken;
use crate::key::FileKey;
use crate::listener::Notifier;
use crate::progress_store::{PersistenceError, ProgressStore};
use crate::segmenter::Segment;
use crate::space::SpaceChecker;
use crate::transport::Transport;

pub use state::TaskState;

/// Collaborators shared by every task of one scheduler.
pub(crate) struct TaskContext {
    pub config: SdmConfig,
    pub store: Arc<dyn ProgressStore>,
    pub transport: Arc<dyn Transport>,
    pub space: Arc<dyn SpaceChecker>,
}

#[derive(Debug)]
struct Progress {
    state: TaskState,
    total_length: u64,
    downloaded_length: u64,
    segments: Vec<Segment>,
    offsets: Vec<u64>,
    /// Stop token of the current (or last) run.
    stop: StopToken,
    /// Bumped whenever the user takes the task out of `Downloading`, so a run
    /// winding down never acts on a later run's state.
    generation: u64,
}

/// One logical download. Obtain through `TaskScheduler::enqueue`.
pub struct DownloadTask {
    key: FileKey,
    notifier: Notifier,
    progress: Mutex<Progress>,
    /// Held for the whole of a run; a resumed run waits for the previous one.
    run_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

impl DownloadTask {
    pub(crate) fn new(key: FileKey, notifier: Notifier) -> Self {
        Self {
            key,
            notifier,
            progress: Mutex::new(Progress {
                state: TaskState::Queued,
                total_length: 0,
                downloaded_length: 0,
                segments: Vec::new(),
                offsets: Vec::new(),
                stop: StopToken::new(),
                generation: 0,
            }),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        match self.progress.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn key(&self) -> &FileKey {
        &self.key
    }

    /// Display name used in listener callbacks.
    pub fn name(&self) -> String {
        self.key.name()
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    /// Content length resolved by the last probe, 0 before the first one.
    pub fn total_length(&self) -> u64 {
        self.lock().total_length
    }

    pub fn downloaded_length(&self) -> u64 {
        self.lock().downloaded_length
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.lock().segments.clone()
    }

    /// Bytes written per segment; sums to `downloaded_length`.
    pub fn segment_offsets(&self) -> Vec<u64> {
        self.lock().offsets.clone()
    }

    /// `Queued -> Downloading`. Returns false when the task is in any other state.
    pub(crate) fn promote(&self) -> bool {
        let mut p = self.lock();
        if p.state != TaskState::Queued {
            return false;
        }
        p.state = TaskState::Downloading;
        true
    }

    /// `Paused | Failed -> Queued`.
    pub(crate) fn requeue(&self) -> bool {
        let mut p = self.lock();
        if !p.state.is_resumable() {
            return false;
        }
        p.state = TaskState::Queued;
        true
    }

    /// Stop the current run and park the task. Persisted progress is kept.
    pub(crate) fn pause(&self) -> bool {
        let mut p = self.lock();
        if !p.state.is_active() {
            return false;
        }
        p.state = TaskState::Paused;
        p.generation += 1;
        p.stop.stop();
        true
    }

    /// Mark discarded and stop the current run. False for finished or
    /// already discarded tasks.
    fn mark_discarded(&self) -> bool {
        let mut p = self.lock();
        if p.state.is_terminal() {
            return false;
        }
        p.state = TaskState::Discarded;
        p.generation += 1;
        p.stop.stop();
        true
    }

    /// Stop, wait for the current run to wind down, then erase the stored
    /// record and (optionally) the unfinished file.
    pub(crate) async fn discard(&self, ctx: &TaskContext) -> Result<bool, PersistenceError> {
        if !self.mark_discarded() {
            return Ok(false);
        }
        let _run = self.run_lock.lock().await;
        ctx.store.delete(&self.key).await?;
        if ctx.config.remove_partial_on_discard {
            match tokio::fs::remove_file(self.key.path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        {
            let mut p = self.lock();
            p.downloaded_length = 0;
            p.offsets.iter_mut().for_each(|o| *o = 0);
        }
        tracing::info!(key = %self.key, "download discarded");
        Ok(true)
    }

    /// Add `len` bytes to segment `index` and to the aggregate, returning the
    /// new aggregate. The only place the counters change while a run is live.
    /// Memory only: the run loop persists the counters once per drained burst
    /// of chunk events.
    pub(crate) fn append(&self, index: usize, len: u64) -> u64 {
        let mut p = self.lock();
        if let Some(o) = p.offsets.get_mut(index) {
            *o += len;
        }
        p.downloaded_length += len;
        p.downloaded_length
    }
}
