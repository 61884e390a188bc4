//! Free-space preflight for the target volume.

use std::path::Path;

/// Answers whether a directory's filesystem can hold `required` more bytes.
/// Pure query: never creates or writes anything.
pub trait SpaceChecker: Send + Sync + 'static {
    fn has_enough_space(&self, dir: &Path, required: u64) -> bool;
}

/// `statvfs`-based checker. Unknown answers (non-Unix targets, failed syscall)
/// count as enough space so the download itself reports the real error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSpaceChecker;

impl FsSpaceChecker {
    /// Bytes available to unprivileged users on the filesystem holding `dir`,
    /// walking up to the nearest existing ancestor.
    #[cfg(unix)]
    pub fn available_bytes(dir: &Path) -> Option<u64> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let existing = dir.ancestors().find(|p| !p.as_os_str().is_empty() && p.exists());
        let existing = existing.unwrap_or_else(|| Path::new("."));
        let c_path = CString::new(existing.as_os_str().as_bytes()).ok()?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if r != 0 {
            tracing::debug!(dir = %existing.display(), "statvfs failed");
            return None;
        }
        Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
    }

    #[cfg(not(unix))]
    pub fn available_bytes(_dir: &Path) -> Option<u64> {
        None
    }
}

impl SpaceChecker for FsSpaceChecker {
    fn has_enough_space(&self, dir: &Path, required: u64) -> bool {
        match Self::available_bytes(dir) {
            Some(available) => available >= required,
            None => true,
        }
    }
}
