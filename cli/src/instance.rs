use anyhow::Context;
use fd_lock::RwLock;
use fd_lock::RwLockWriteGuard;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

pub const INSTANCE_LOCK_FILE_NAME: &str = "remotehand.lock";

#[derive(Debug, thiserror::Error)]
#[error("another RemoteHand instance is already running")]
pub struct AlreadyRunning;

/// Keeps a single interactive helper per user. The elevated child never
/// takes it.
pub struct InstanceLock {
    lock: RwLock<File>,
}

impl InstanceLock {
    pub fn open(home: &Path) -> anyhow::Result<Self> {
        let path = home.join(INSTANCE_LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("opening instance lock {}", path.display()))?;
        Ok(Self {
            lock: RwLock::new(file),
        })
    }

    pub fn try_acquire(&mut self) -> anyhow::Result<RwLockWriteGuard<'_, File>> {
        match self.lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(AlreadyRunning.into()),
            Err(err) => Err(anyhow::Error::new(err).context("locking instance lock")),
        }
    }
}
