use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Exclusive advisory lock on a board directory, held for the span of one
/// load-edit-save cycle so two `bb` invocations never interleave writes.
///
/// The lock file `board/.lock` is left in place; only the flock matters.
#[derive(Debug)]
pub struct BoardLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("board is locked by another bb process ({path})")]
    Busy { path: PathBuf },
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl BoardLock {
    /// Wait up to `timeout` for the lock.
    pub fn acquire(board_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = board_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        while try_flock(&file).is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Busy { path });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        tracing::debug!(path = %path.display(), "board lock acquired");
        Ok(BoardLock { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Non-blocking exclusive flock. Released when `file` is closed.
#[cfg(unix)]
pub(crate) fn try_flock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub(crate) fn try_flock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = BoardLock::acquire(tmp.path(), Duration::from_secs(1)).unwrap();
        assert!(lock.path().ends_with(".lock"));
        drop(lock);
        assert!(BoardLock::acquire(tmp.path(), Duration::from_secs(1)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_second_holder_times_out() {
        let tmp = TempDir::new().unwrap();
        let _held = BoardLock::acquire(tmp.path(), Duration::from_secs(1)).unwrap();
        let second = BoardLock::acquire(tmp.path(), Duration::from_millis(60));
        assert!(matches!(second, Err(LockError::Busy { .. })));
    }
}
