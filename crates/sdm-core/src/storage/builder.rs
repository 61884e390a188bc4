//! Builder for opening and allocating the target file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Builder for the target file. Call `allocate` then `build` to get a
/// `StorageWriter` that supports concurrent `write_at` from multiple workers.
pub struct StorageWriterBuilder {
    file: File,
    path: PathBuf,
}

impl StorageWriterBuilder {
    /// Open `path` for read+write, creating it if missing. Existing content is kept
    /// so a resumed download does not lose bytes written by an earlier run.
    pub fn open_or_create(path: &Path) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(StorageWriterBuilder {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Make the file exactly `size` bytes long. Growth on Linux tries `posix_fallocate`
    /// for real block allocation; falls back to `set_len` (sparse) on failure or other targets.
    pub fn allocate(&mut self, size: u64) -> io::Result<()> {
        let current = self.file.metadata()?.len();
        if current > size {
            self.file.set_len(size)?;
            return Ok(());
        }
        if current == size {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file.set_len(size)
    }

    /// Finish building and return a writer that can be shared for concurrent writes.
    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file_and_path(self.file, self.path)
    }
}
