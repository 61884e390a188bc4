//! Lifecycle states of a download task.

use std::fmt;

/// `Queued -> Downloading -> {Success, Paused, Discarded, Failed}`.
/// `Paused` and `Failed` go back to `Queued` on resume; `Success` and
/// `Discarded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Queued,
    Downloading,
    Paused,
    Success,
    Discarded,
    Failed,
}

impl TaskState {
    /// Queued or downloading: the task holds or waits for a scheduler slot.
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Downloading)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Discarded)
    }

    /// States an explicit resume may leave.
    pub fn is_resumable(self) -> bool {
        matches!(self, TaskState::Paused | TaskState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Downloading => "downloading",
            TaskState::Paused => "paused",
            TaskState::Success => "success",
            TaskState::Discarded => "discarded",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
