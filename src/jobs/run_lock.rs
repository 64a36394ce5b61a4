use std::{
    fmt::{self, Display, Formatter},
    fs::{self, File, OpenOptions},
    io::{self, Write as _},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Base delay between acquisition attempts in bounded-wait mode
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Upper bound of the random jitter added to each poll
const LOCK_POLL_JITTER_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "timeout_seconds", rename_all = "snake_case")]
pub enum LockMode {
    /// Try once and skip this tick if the resource is busy
    NonBlocking,
    /// Queue for up to the given number of seconds, then give up
    BoundedWait(u64),
}

impl Display for LockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonBlocking => write!(f, "non_blocking"),
            Self::BoundedWait(seconds) => write!(f, "bounded_wait({seconds}s)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock for {resource_id} is held by another run (waited {}s)", waited.as_secs())]
    Busy {
        resource_id: String,
        waited: Duration,
    },
    #[error("lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Host-wide exclusive locks, one file per protected resource.
///
/// Locks are `flock(2)` locks on files in `lock_dir`. The kernel drops them
/// when the descriptor is closed, which covers normal drops as well as a
/// holder that is killed outright.
#[derive(Debug, Clone)]
pub struct RunLock {
    lock_dir: PathBuf,
}

/// Held lock; released when dropped
#[derive(Debug)]
pub struct RunLockGuard {
    _lock_file: File,
    resource_id: String,
    path: PathBuf,
}

impl RunLockGuard {
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        debug!("🔓 Released run lock for {}", self.resource_id);
    }
}

impl RunLock {
    #[must_use]
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
        }
    }

    #[must_use]
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Lock file backing `resource_id`
    #[must_use]
    pub fn lock_path(&self, resource_id: &str) -> PathBuf {
        self.lock_dir
            .join(format!("{}.lock", encode_resource_id(resource_id)))
    }

    /// Single non-blocking attempt. `Ok(None)` means another holder has it.
    pub fn try_acquire(&self, resource_id: &str) -> Result<Option<RunLockGuard>, LockError> {
        let path = self.lock_path(resource_id);
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.lock_dir).map_err(io_error)?;

        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        if !try_flock_exclusive(&lock_file).map_err(io_error)? {
            return Ok(None);
        }

        // Holder pid for operators inspecting a stuck lock.
        if let Err(e) = lock_file
            .set_len(0)
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
        {
            warn!("Failed to record holder in {}: {}", path.display(), e);
        }

        debug!("🔒 Acquired run lock for {}", resource_id);

        Ok(Some(RunLockGuard {
            _lock_file: lock_file,
            resource_id: resource_id.to_string(),
            path,
        }))
    }

    /// Acquires the lock for `resource_id` according to `mode`.
    ///
    /// Bounded waits poll with jitter; whichever waiter reaches the kernel
    /// first after a release wins, there is no queue order.
    pub async fn acquire(
        &self,
        resource_id: &str,
        mode: LockMode,
    ) -> Result<RunLockGuard, LockError> {
        let timeout = match mode {
            LockMode::NonBlocking => Duration::ZERO,
            LockMode::BoundedWait(seconds) => Duration::from_secs(seconds),
        };
        let start = Instant::now();

        loop {
            if let Some(guard) = self.try_acquire(resource_id)? {
                return Ok(guard);
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(LockError::Busy {
                    resource_id: resource_id.to_string(),
                    waited,
                });
            }

            debug!(
                "🔒 Run lock for {} held by another run, waiting...",
                resource_id
            );

            let jitter = Duration::from_millis(fastrand::u64(0..=LOCK_POLL_JITTER_MS));
            let poll = LOCK_POLL_INTERVAL + jitter;
            sleep(poll.min(timeout - waited)).await;
        }
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9._-]` so distinct resource
/// ids always map to distinct file names.
fn encode_resource_id(resource_id: &str) -> String {
    let mut encoded = String::with_capacity(resource_id.len());
    for byte in resource_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Returns `Ok(true)` if the exclusive lock was taken, `Ok(false)` if it is
/// held through another open file description.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "run locks require flock(2)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_in(dir: &tempfile::TempDir) -> RunLock {
        RunLock::new(dir.path().join("locks"))
    }

    #[test]
    fn test_resource_ids_encode_injectively() {
        assert_eq!(encode_resource_id("/data/x.db"), "%2Fdata%2Fx.db");
        assert_ne!(
            encode_resource_id("/data/x.db"),
            encode_resource_id("/data_x.db")
        );
        assert_ne!(encode_resource_id("a%2Fb"), encode_resource_id("a/b"));
    }

    #[tokio::test]
    async fn test_second_non_blocking_acquire_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let first = lock.acquire("db", LockMode::NonBlocking).await;
        let started = Instant::now();
        let second = lock.acquire("db", LockMode::NonBlocking).await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(LockError::Busy { .. })));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_lock_is_keyed_by_resource() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let _db = lock.acquire("/data/a.db", LockMode::NonBlocking).await.unwrap();
        let other = lock.acquire("/data/b.db", LockMode::NonBlocking).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_released_lock_can_be_reacquired() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let guard = lock.acquire("db", LockMode::NonBlocking).await.unwrap();
        drop(guard);

        let again = lock.acquire("db", LockMode::NonBlocking).await;
        assert!(again.is_ok());
    }

    #[test]
    fn test_closing_descriptor_without_unlock_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        // A killed holder leaves nothing behind but a closed descriptor.
        fs::create_dir_all(lock.lock_dir()).unwrap();
        let foreign = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock.lock_path("db"))
            .unwrap();
        assert!(try_flock_exclusive(&foreign).unwrap());
        assert!(lock.try_acquire("db").unwrap().is_none());

        drop(foreign);

        assert!(lock.try_acquire("db").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bounded_wait_succeeds_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let holder = lock.acquire("db", LockMode::NonBlocking).await.unwrap();
        let release = tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            drop(holder);
        });

        let started = Instant::now();
        let waited = lock.acquire("db", LockMode::BoundedWait(5)).await;
        release.await.unwrap();

        assert!(waited.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out_when_never_released() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let _holder = lock.acquire("db", LockMode::NonBlocking).await.unwrap();

        let started = Instant::now();
        let result = lock.acquire("db", LockMode::BoundedWait(1)).await;

        match result {
            Err(LockError::Busy { waited, .. }) => {
                assert!(waited >= Duration::from_secs(1));
            }
            other => panic!("expected busy, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_lock_file_records_holder_pid() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);

        let guard = lock.try_acquire("db").unwrap().unwrap();
        let contents = fs::read_to_string(guard.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_unusable_lock_dir_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let lock = RunLock::new(blocker.join("locks"));
        assert!(matches!(lock.try_acquire("db"), Err(LockError::Io { .. })));
    }
}
