//! Identity of a download.

use std::fmt;
use std::path::{Path, PathBuf};

/// A download is identified by where it is written and where it comes from.
/// Two tasks with equal keys are the same logical download.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    path: PathBuf,
    url: String,
}

impl FileKey {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// File name of the target, used as the display name in listener callbacks.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Directory holding the target file (`.` for bare file names).
    pub fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Stored path string for persistence rows.
    pub(crate) fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.path.display(), self.url)
    }
}
