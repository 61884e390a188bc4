//! Download observers and the context their callbacks run on.
//!
//! Tasks never call a `DownloadListener` from a segment worker. Every callback
//! is boxed and posted to the caller's `CallbackExecutor`, which decides where
//! it runs (a UI thread, a dedicated `EventLoop`, or inline in tests).

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::ErrorCode;

/// Observer of one download. Every method has an empty default so listeners
/// only implement what they care about. `name` is the target's file name.
pub trait DownloadListener: Send + Sync + 'static {
    fn on_start(&self, _name: &str, _total_length: u64) {}
    fn on_progress(&self, _name: &str, _downloaded_length: u64) {}
    fn on_finish(&self, _name: &str) {}
    fn on_fail(&self, _name: &str, _code: ErrorCode) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl DownloadListener for NoopListener {}

pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Where listener callbacks are executed.
pub trait CallbackExecutor: Send + Sync + 'static {
    fn post(&self, callback: Callback);
}

/// Runs callbacks on the posting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn post(&self, callback: Callback) {
        callback();
    }
}

enum Message {
    Run(Callback),
    Flush(mpsc::SyncSender<()>),
}

/// Single delivery thread; callbacks run one at a time in posting order.
/// Dropping the loop drains pending callbacks and joins the thread.
pub struct EventLoop {
    tx: Mutex<Option<mpsc::Sender<Message>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EventLoop {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message>();
        let handle = thread::Builder::new()
            .name("sdm-events".to_string())
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    match msg {
                        Message::Run(cb) => cb(),
                        Message::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Some(handle),
        })
    }

    fn send(&self, msg: Message) -> bool {
        let guard = match self.tx.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Block until every callback posted before this call has run.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if self.send(Message::Flush(ack_tx)) {
            let _ = ack_rx.recv();
        }
    }
}

impl CallbackExecutor for EventLoop {
    fn post(&self, callback: Callback) {
        if !self.send(Message::Run(callback)) {
            tracing::warn!("event loop stopped, dropping callback");
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Posts one task's callbacks to its executor, tagged with the display name.
#[derive(Clone)]
pub(crate) struct Notifier {
    name: Arc<str>,
    listener: Arc<dyn DownloadListener>,
    executor: Arc<dyn CallbackExecutor>,
}

impl Notifier {
    pub(crate) fn new(
        name: String,
        listener: Arc<dyn DownloadListener>,
        executor: Arc<dyn CallbackExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            listener,
            executor,
        }
    }

    fn post(&self, f: impl FnOnce(&dyn DownloadListener, &str) + Send + 'static) {
        let name = Arc::clone(&self.name);
        let listener = Arc::clone(&self.listener);
        self.executor.post(Box::new(move || f(listener.as_ref(), &name)));
    }

    pub(crate) fn start(&self, total_length: u64) {
        self.post(move |l, name| l.on_start(name, total_length));
    }

    pub(crate) fn progress(&self, downloaded_length: u64) {
        self.post(move |l, name| l.on_progress(name, downloaded_length));
    }

    pub(crate) fn finish(&self) {
        self.post(|l, name| l.on_finish(name));
    }

    pub(crate) fn fail(&self, code: ErrorCode) {
        self.post(move |l, name| l.on_fail(name, code));
    }
}
