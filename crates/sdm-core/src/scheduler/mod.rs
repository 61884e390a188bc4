//! Cross-file scheduler.
//!
//! Owns every known `DownloadTask`, keeps at most `parallel_task_count` of
//! them downloading and promotes queued tasks in FIFO order whenever a slot
//! frees up. Runs execute on the tokio runtime the scheduler was created on.

mod registry;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::SdmConfig;
use crate::key::FileKey;
use crate::listener::{CallbackExecutor, DownloadListener, Notifier};
use crate::progress_store::{PersistenceError, ProgressStore};
use crate::space::SpaceChecker;
use crate::task::{DownloadTask, TaskContext};
use crate::transport::Transport;

use registry::Registry;

struct Shared {
    ctx: TaskContext,
    executor: Arc<dyn CallbackExecutor>,
    runtime: Handle,
    registry: Mutex<Registry>,
    idle: watch::Sender<bool>,
}

/// Handle to one scheduler; clones share the same queue and ceiling.
#[derive(Clone)]
pub struct TaskScheduler {
    shared: Arc<Shared>,
}

impl TaskScheduler {
    /// Create a scheduler whose runs are spawned on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// When called outside a tokio runtime.
    pub fn new(
        config: SdmConfig,
        store: Arc<dyn ProgressStore>,
        transport: Arc<dyn Transport>,
        space: Arc<dyn SpaceChecker>,
        executor: Arc<dyn CallbackExecutor>,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                ctx: TaskContext {
                    config,
                    store,
                    transport,
                    space,
                },
                executor,
                runtime: Handle::current(),
                registry: Mutex::new(Registry::default()),
                idle,
            }),
        }
    }

    pub fn config(&self) -> &SdmConfig {
        &self.shared.ctx.config
    }

    fn ceiling(&self) -> usize {
        self.shared.ctx.config.parallel_task_count.max(1)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        match self.shared.registry.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Promote what fits, publish idleness, then spawn the promoted runs.
    fn rebalance_locked(&self, mut reg: MutexGuard<'_, Registry>) {
        let promoted = reg.take_promotable(self.ceiling());
        self.shared.idle.send_replace(reg.is_idle());
        drop(reg);
        for task in promoted {
            self.launch(task);
        }
    }

    fn launch(&self, task: Arc<DownloadTask>) {
        tracing::debug!(key = %task.key(), "task promoted");
        let this = self.clone();
        self.shared.runtime.spawn(async move {
            let run = {
                let task = Arc::clone(&task);
                let this = this.clone();
                tokio::spawn(async move { task.deploy(&this.shared.ctx).await })
            };
            if let Err(e) = run.await {
                tracing::error!(key = %task.key(), error = %e, "download run panicked");
            }
            this.settle(&task);
        });
    }

    fn settle(&self, task: &Arc<DownloadTask>) {
        let mut reg = self.registry();
        reg.run_settled();
        if task.state().is_terminal() {
            reg.remove(task);
        }
        self.rebalance_locked(reg);
    }

    /// Queue a download of `url` into `path`, or return the task that already
    /// owns this key. A paused or failed task is re-queued and returned; its
    /// original listener stays attached.
    pub fn enqueue(
        &self,
        path: impl Into<PathBuf>,
        url: impl Into<String>,
        listener: Arc<dyn DownloadListener>,
    ) -> Arc<DownloadTask> {
        let key = FileKey::new(path, url);
        let mut reg = self.registry();

        if let Some(existing) = reg.get(&key).cloned() {
            let state = existing.state();
            if state.is_active() {
                return existing;
            }
            if existing.requeue() {
                tracing::info!(key = %key, from = %state, "re-queued existing task");
                reg.push_queue(Arc::clone(&existing));
                self.rebalance_locked(reg);
                return existing;
            }
        }

        let notifier = Notifier::new(key.name(), listener, Arc::clone(&self.shared.executor));
        let task = Arc::new(DownloadTask::new(key, notifier));
        tracing::info!(key = %task.key(), "task queued");
        reg.insert(Arc::clone(&task));
        self.rebalance_locked(reg);
        task
    }

    /// The live task for this key, if any. Finished and discarded tasks are not returned.
    pub fn lookup(&self, path: impl Into<PathBuf>, url: impl Into<String>) -> Option<Arc<DownloadTask>> {
        let key = FileKey::new(path, url);
        self.registry()
            .get(&key)
            .filter(|t| !t.state().is_terminal())
            .cloned()
    }

    /// Stop `task` cooperatively and free its slot. Returns false if it was
    /// neither queued nor downloading.
    pub fn pause(&self, task: &Arc<DownloadTask>) -> bool {
        let mut reg = self.registry();
        if !task.pause() {
            return false;
        }
        reg.dequeue(task);
        tracing::info!(key = %task.key(), "task paused");
        self.rebalance_locked(reg);
        true
    }

    /// Put a paused or failed task back in the queue behind everything already waiting.
    pub fn resume(&self, task: &Arc<DownloadTask>) -> bool {
        let mut reg = self.registry();
        if !task.requeue() {
            return false;
        }
        tracing::info!(key = %task.key(), "task resumed");
        reg.push_queue(Arc::clone(task));
        self.rebalance_locked(reg);
        true
    }

    /// Pause every queued or downloading task.
    pub fn pause_all(&self) -> usize {
        let active = self.active_tasks();
        active.iter().filter(|t| self.pause(t)).count()
    }

    /// Stop `task`, wait for its run to end and erase its stored progress.
    /// A finished task is left alone and `Ok(false)` is returned.
    pub async fn discard(&self, task: &Arc<DownloadTask>) -> Result<bool, PersistenceError> {
        let discarded = task.discard(&self.shared.ctx).await;
        let mut reg = self.registry();
        if matches!(discarded, Ok(true)) {
            reg.remove(task);
        }
        self.rebalance_locked(reg);
        discarded
    }

    /// Queued and downloading tasks in the order they were first enqueued.
    pub fn active_tasks(&self) -> Vec<Arc<DownloadTask>> {
        self.registry().active()
    }

    pub fn running_count(&self) -> usize {
        self.registry().downloading_count()
    }

    /// Resolve once nothing is queued, downloading or winding down.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }
}
