pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod key;
pub mod listener;
pub mod progress_store;
pub mod scheduler;
pub mod segmenter;
pub mod space;
pub mod storage;
pub mod task;
pub mod transport;
pub mod url_model;

pub use config::SdmConfig;
pub use error::{DownloadError, ErrorCode};
pub use key::FileKey;
pub use listener::{CallbackExecutor, DownloadListener, EventLoop, InlineExecutor, NoopListener};
pub use scheduler::TaskScheduler;
pub use space::{FsSpaceChecker, SpaceChecker};
pub use task::{DownloadTask, TaskState};
