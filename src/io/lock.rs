use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";
const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock on the data directory, held for the length of
/// one read-modify-write of the slot. Released when dropped.
///
/// The lock file is never unlinked, so every process locks the same inode.
#[derive(Debug)]
pub struct SlotLock {
    _file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is held by another nk process (gave up after {waited:?})")]
    Timeout { path: PathBuf, waited: Duration },
}

impl SlotLock {
    /// Lock `data_dir`, polling until `wait` runs out.
    pub fn acquire_within(data_dir: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Create {
                path: path.clone(),
                source,
            })?;

        let start = Instant::now();
        while !try_flock(&file) {
            if start.elapsed() >= wait {
                return Err(LockError::Timeout {
                    path,
                    waited: start.elapsed(),
                });
            }
            std::thread::sleep(POLL);
        }
        tracing::trace!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "slot locked");
        Ok(SlotLock { _file: file })
    }

    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire_within(data_dir, DEFAULT_WAIT)
    }
}

#[cfg(unix)]
fn try_flock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    // Released implicitly when the descriptor closes
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> bool {
    true
}
