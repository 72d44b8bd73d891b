//! Advisory lock on the data directory.
//!
//! The daemon takes it for its whole lifetime; a standalone CLI takes it for
//! one command. A CLI forwarding to a daemon (`HISTAG_ADDR`) never touches
//! the data directory and skips it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use crate::app::factory::ADDR_ENV;

const LOCK_FILE_NAME: &str = "histag.lock";

/// How long a local CLI command waits for a busy data directory.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Released when dropped.
pub struct FileLock {
    file: File,
}

impl FileLock {
    fn open(base_path: &Path) -> io::Result<File> {
        std::fs::create_dir_all(base_path)?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(base_path.join(LOCK_FILE_NAME))
    }

    /// Fails with `WouldBlock` if another process holds the lock.
    pub fn try_acquire(base_path: &Path) -> io::Result<Self> {
        let file = Self::open(base_path)?;
        flock(&file)?;
        Ok(FileLock { file })
    }

    /// Retries until `timeout` runs out, then fails with `WouldBlock`.
    pub fn acquire_within(base_path: &Path, timeout: Duration) -> io::Result<Self> {
        let started = Instant::now();
        let mut warned = false;

        loop {
            match Self::try_acquire(base_path) {
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if started.elapsed() >= timeout {
                        return Err(io::Error::new(
                            io::ErrorKind::WouldBlock,
                            format!(
                                "{} is locked by another histag process; if the daemon is running, set {ADDR_ENV} to talk to it",
                                base_path.display()
                            ),
                        ));
                    }
                    if !warned {
                        log::warn!(
                            "{} is in use by another histag process, waiting up to {:?}",
                            base_path.display(),
                            timeout
                        );
                        warned = true;
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                other => return other,
            }
        }
    }
}

#[cfg(unix)]
fn flock(file: &File) -> io::Result<()> {
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "data directory is locked by another histag process",
        ));
    }
    Err(err)
}

// no locking outside unix
#[cfg(not(unix))]
fn flock(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
    }
}

pub fn is_remote() -> bool {
    std::env::var(ADDR_ENV).is_ok()
}

/// A lock held for one CLI command, or nothing when talking to a daemon.
pub enum LockGuard {
    Held(FileLock),
    Skipped,
}

impl LockGuard {
    pub fn acquire_if_local(base_path: &Path) -> io::Result<Self> {
        if is_remote() {
            Ok(LockGuard::Skipped)
        } else {
            FileLock::acquire_within(base_path, LOCK_TIMEOUT).map(LockGuard::Held)
        }
    }
}
