//! Cross-platform advisory exclusive locking over `beads.lock` (C4, §4.4, §5).
//!
//! Grounded on the teacher's `FileLock` (`flock`/`LockFileEx`, unix/windows
//! split); adds a blocking-with-timeout acquire and a plain blocking acquire,
//! since every caller here is a short-lived CLI process rather than a
//! long-running server that can afford to fail fast on contention.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::StorageError;

/// A held exclusive lock. Released (by the kernel) when dropped.
#[derive(Debug)]
pub struct ExclusiveLock {
    _file: File,
    path: PathBuf,
}

impl ExclusiveLock {
    /// Non-blocking acquire; fails immediately on contention.
    pub fn try_acquire(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::io(path.display().to_string(), e))?;

        Self::try_lock(&file, path)?;

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Blocks indefinitely, polling with capped exponential backoff, until
    /// the lock is held. Unlike [`Self::acquire_timeout`], this never gives
    /// up — callers that want a bound should use that instead.
    pub fn acquire(path: &Path) -> Result<Self, StorageError> {
        let mut backoff = Duration::from_millis(5);
        loop {
            match Self::try_acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(_) => {
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(100));
                }
            }
        }
    }

    /// Blocks up to `timeout_ms`, polling, before giving up.
    pub fn acquire_timeout(path: &Path, timeout_ms: u64) -> Result<Self, StorageError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut backoff = Duration::from_millis(5);
        loop {
            match Self::try_acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(_) if Instant::now() < deadline => {
                    thread::sleep(backoff.min(deadline.saturating_duration_since(Instant::now())));
                    backoff = (backoff * 2).min(Duration::from_millis(100));
                }
                Err(_) => {
                    return Err(StorageError::LockTimeout {
                        path: path.display().to_string(),
                        ms: timeout_ms,
                    })
                }
            }
        }
    }

    /// Path of the lock file this lock holds.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn try_lock(file: &File, path: &Path) -> Result<(), StorageError> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let errno = std::io::Error::last_os_error();
            return Err(StorageError::LockFailed {
                path: path.display().to_string(),
                reason: errno.to_string(),
            });
        }
        Ok(())
    }

    #[cfg(windows)]
    fn try_lock(file: &File, path: &Path) -> Result<(), StorageError> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };

        let handle = file.as_raw_handle() as HANDLE;
        let result = unsafe {
            let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(StorageError::LockFailed {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn try_lock(_file: &File, path: &Path) -> Result<(), StorageError> {
        Err(StorageError::LockFailed {
            path: path.display().to_string(),
            reason: "file locking unsupported on this platform".to_string(),
        })
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        // Kernel releases the advisory lock when the fd closes; nothing to do.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beads.lock");
        {
            let _lock = ExclusiveLock::try_acquire(&path).unwrap();
            assert!(ExclusiveLock::try_acquire(&path).is_err());
        }
        assert!(ExclusiveLock::try_acquire(&path).is_ok());
    }

    #[test]
    fn acquire_timeout_gives_up_when_contended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beads.lock");
        let _holder = ExclusiveLock::try_acquire(&path).unwrap();
        let err = ExclusiveLock::acquire_timeout(&path, 30).unwrap_err();
        assert!(matches!(err, StorageError::LockTimeout { .. }));
    }

    #[test]
    fn acquire_blocks_until_the_holder_releases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beads.lock");
        let holder = ExclusiveLock::try_acquire(&path).unwrap();

        let released_path = path.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(holder);
            released_path
        });

        let lock = ExclusiveLock::acquire(&path).unwrap();
        handle.join().unwrap();
        assert_eq!(lock.path(), path);
    }
}
