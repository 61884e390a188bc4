//! One run of a task: probe, validate, preflight, fan out, fold in.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::control::StopToken;
use crate::error::{DownloadError, LocalFileStateError};
use crate::progress_store::{DownloadFlag, PersistenceError};
use crate::segmenter::plan_segments;
use crate::storage::{self, StorageWriter, StorageWriterBuilder};

use super::validate::{check_local_state, LocalState, StoredState};
use super::worker::{SegmentEvent, SegmentOutcome, SegmentWorker};
use super::{DownloadTask, TaskContext, TaskState};

/// Channel slots per worker; a full channel applies backpressure to the
/// network reads, not to the task.
const EVENTS_PER_WORKER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    /// Every segment completed and the file is verified.
    Finished,
    /// The user paused or discarded the task mid-run.
    Stopped,
}

/// Outcomes collected from worker events during one run.
#[derive(Default)]
struct Tally {
    completed: usize,
    first_error: Option<DownloadError>,
}

fn join_failed(e: JoinError) -> DownloadError {
    DownloadError::WorkerPanicked(e.to_string())
}

/// Open (without truncating) and size the target file.
fn prepare_file(path: &Path, total_length: u64) -> Result<StorageWriter, LocalFileStateError> {
    let open_err = |source| LocalFileStateError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(open_err)?;
    }
    let mut builder = StorageWriterBuilder::open_or_create(path).map_err(open_err)?;
    builder
        .allocate(total_length)
        .map_err(|source| LocalFileStateError::Allocate {
            path: path.to_path_buf(),
            len: total_length,
            source,
        })?;
    Ok(builder.build())
}

impl DownloadTask {
    /// Run the task once. Only acts when the scheduler has promoted it to
    /// `Downloading`; emits at most one terminal callback.
    pub(crate) async fn deploy(&self, ctx: &TaskContext) {
        let _run = self.run_lock.lock().await;
        let Some((stop, generation)) = self.begin_run() else {
            tracing::debug!(key = %self.key, state = %self.state(), "not downloading, run skipped");
            return;
        };
        tracing::info!(key = %self.key, "download run starting");

        match self.run(ctx, &stop).await {
            Ok(RunEnd::Finished) => {
                if self.settle_state(generation, TaskState::Success) {
                    tracing::info!(key = %self.key, bytes = self.total_length(), "download finished");
                    self.notifier.finish();
                }
            }
            Ok(RunEnd::Stopped) => {
                tracing::info!(
                    key = %self.key,
                    downloaded = self.downloaded_length(),
                    state = %self.state(),
                    "download run stopped"
                );
            }
            Err(e) => self.fail(ctx, generation, e).await,
        }
    }

    fn begin_run(&self) -> Option<(StopToken, u64)> {
        let mut p = self.lock();
        if p.state != TaskState::Downloading {
            return None;
        }
        let stop = StopToken::new();
        p.stop = stop.clone();
        Some((stop, p.generation))
    }

    /// Move out of `Downloading` if the run identified by `generation` still
    /// owns the task.
    fn settle_state(&self, generation: u64, next: TaskState) -> bool {
        let mut p = self.lock();
        if p.state != TaskState::Downloading || p.generation != generation {
            return false;
        }
        p.state = next;
        true
    }

    async fn fail(&self, ctx: &TaskContext, generation: u64, error: DownloadError) {
        let next = if error.is_recoverable() {
            TaskState::Paused
        } else {
            TaskState::Failed
        };
        if !self.settle_state(generation, next) {
            tracing::debug!(key = %self.key, error = %error, "run failed after being stopped");
            return;
        }
        tracing::warn!(key = %self.key, error = %error, state = %next, "download failed");
        // A failed probe leaves local state untouched.
        if !matches!(error, DownloadError::Probe(_)) {
            if let Err(e) = ctx.store.update_flag(&self.key, DownloadFlag::Error).await {
                tracing::warn!(key = %self.key, error = %e, "could not persist error flag");
            }
        }
        self.notifier.fail(error.code());
    }

    /// Stored progress for this key. An undecodable record is deleted and
    /// reads as absent.
    async fn load_stored(&self, ctx: &TaskContext) -> Result<StoredState, PersistenceError> {
        let read = async {
            Ok::<_, PersistenceError>(StoredState {
                flag: ctx.store.query_flag(&self.key).await?,
                downloaded_length: ctx.store.query_downloaded_length(&self.key).await?,
                segment_offsets: ctx.store.query_segment_offsets(&self.key).await?,
            })
        };
        match read.await {
            Err(e) if e.is_corrupt() => {
                tracing::warn!(key = %self.key, error = %e, "stored progress is corrupt, starting over");
                ctx.store.delete(&self.key).await?;
                Ok(StoredState::default())
            }
            other => other,
        }
    }

    async fn run(&self, ctx: &TaskContext, stop: &StopToken) -> Result<RunEnd, DownloadError> {
        let probe = {
            let transport = Arc::clone(&ctx.transport);
            let url = self.key.url().to_string();
            tokio::task::spawn_blocking(move || transport.probe(&url))
                .await
                .map_err(join_failed)?
                .map_err(DownloadError::Probe)?
        };
        let total_length = probe.content_length;
        if !probe.accept_ranges {
            tracing::warn!(key = %self.key, "server does not advertise byte ranges");
        }
        if stop.is_stopped() {
            return Ok(RunEnd::Stopped);
        }

        let stored = self.load_stored(ctx).await?;
        let (segments, offsets, downloaded_length) =
            match check_local_state(&stored, storage::file_len(self.key.path()), total_length) {
                LocalState::Resume {
                    segments,
                    offsets,
                    downloaded_length,
                } => {
                    tracing::info!(key = %self.key, downloaded_length, total_length, "resuming");
                    (segments, offsets, downloaded_length)
                }
                other => {
                    if let LocalState::Stale(reason) = &other {
                        tracing::info!(key = %self.key, %reason, "stored progress is stale, starting over");
                    }
                    if stored != StoredState::default() {
                        ctx.store.delete(&self.key).await?;
                    }
                    let n = ctx.config.worker_count.max(1);
                    (plan_segments(total_length, n), vec![0; n], 0)
                }
            };

        let required = total_length - downloaded_length;
        let dir = self.key.parent_dir();
        if !ctx.space.has_enough_space(dir, required) {
            return Err(DownloadError::SpaceInsufficient {
                dir: dir.to_path_buf(),
                required,
            });
        }

        let writer = {
            let path = self.key.path().to_path_buf();
            tokio::task::spawn_blocking(move || prepare_file(&path, total_length))
                .await
                .map_err(join_failed)??
        };
        ctx.store
            .insert_flag(&self.key, DownloadFlag::InProgress, total_length)
            .await?;
        ctx.store
            .update_download_length(&self.key, downloaded_length, &offsets)
            .await?;
        {
            let mut p = self.lock();
            p.total_length = total_length;
            p.downloaded_length = downloaded_length;
            p.segments = segments.clone();
            p.offsets = offsets.clone();
        }
        if stop.is_stopped() {
            return Ok(RunEnd::Stopped);
        }
        self.notifier.start(total_length);

        let tally = self.fan_out(ctx, stop, &writer, &segments, &offsets).await;
        if let Some(e) = tally.first_error {
            return Err(e);
        }
        if tally.completed < segments.len() {
            return Ok(RunEnd::Stopped);
        }

        self.verify_file(writer, total_length).await?;
        ctx.store
            .update_flag(&self.key, DownloadFlag::Finished)
            .await?;
        Ok(RunEnd::Finished)
    }

    /// Start one worker per segment and fold their events until all are gone.
    async fn fan_out(
        &self,
        ctx: &TaskContext,
        stop: &StopToken,
        writer: &StorageWriter,
        segments: &[crate::segmenter::Segment],
        offsets: &[u64],
    ) -> Tally {
        let (tx, mut rx) = mpsc::channel(EVENTS_PER_WORKER * segments.len().max(1));
        let mut workers = JoinSet::new();
        for (index, (segment, &resume_offset)) in segments.iter().zip(offsets).enumerate() {
            let worker = SegmentWorker {
                index,
                url: self.key.url().to_string(),
                segment: *segment,
                resume_offset,
                storage: writer.clone(),
                transport: Arc::clone(&ctx.transport),
                stop: stop.clone(),
                events: tx.clone(),
            };
            workers.spawn_blocking(move || worker.run());
        }
        drop(tx);

        let mut tally = Tally::default();
        let mut persisting = true;
        while let Some(event) = rx.recv().await {
            let mut dirty = self.apply_event(event, stop, &mut tally);
            while let Ok(event) = rx.try_recv() {
                dirty |= self.apply_event(event, stop, &mut tally);
            }
            if dirty && persisting {
                if let Err(e) = self.persist_progress(ctx, stop).await {
                    persisting = false;
                    stop.stop();
                    tally.first_error.get_or_insert(e.into());
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                stop.stop();
                tally.first_error.get_or_insert(join_failed(e));
            }
        }
        tally
    }

    /// Returns true when the aggregate changed.
    fn apply_event(&self, event: SegmentEvent, stop: &StopToken, tally: &mut Tally) -> bool {
        match event {
            SegmentEvent::Chunk { index, len } => {
                self.append(index, len);
                true
            }
            SegmentEvent::Done { result: Ok(SegmentOutcome::Completed), .. } => {
                tally.completed += 1;
                false
            }
            SegmentEvent::Done { result: Ok(SegmentOutcome::Stopped), .. } => false,
            SegmentEvent::Done { index, result: Err(source) } => {
                if tally.first_error.is_none() {
                    tracing::debug!(key = %self.key, index, error = %source, "stopping sibling segments");
                    tally.first_error = Some(DownloadError::Segment { index, source });
                }
                stop.stop();
                false
            }
        }
    }

    /// Write the current aggregate and offsets, then report progress.
    async fn persist_progress(&self, ctx: &TaskContext, stop: &StopToken) -> Result<(), PersistenceError> {
        let (downloaded_length, offsets) = {
            let p = self.lock();
            (p.downloaded_length, p.offsets.clone())
        };
        ctx.store
            .update_download_length(&self.key, downloaded_length, &offsets)
            .await?;
        if !stop.is_stopped() {
            self.notifier.progress(downloaded_length);
        }
        Ok(())
    }

    async fn verify_file(&self, writer: StorageWriter, total_length: u64) -> Result<(), DownloadError> {
        let path = writer.path().to_path_buf();
        tokio::task::spawn_blocking(move || writer.sync())
            .await
            .map_err(join_failed)?
            .map_err(|source| LocalFileStateError::Sync {
                path: path.clone(),
                source,
            })?;
        match storage::file_len(&path) {
            None => Err(LocalFileStateError::Missing { path }.into()),
            Some(actual) if actual != total_length => Err(LocalFileStateError::SizeMismatch {
                path,
                expected: total_length,
                actual,
            }
            .into()),
            Some(_) => Ok(()),
        }
    }
}
