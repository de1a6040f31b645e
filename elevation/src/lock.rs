use crate::ElevationError;
use fd_lock::RwLock;
use fd_lock::RwLockWriteGuard;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

pub const LOCK_FILE_NAME: &str = "remotehand-credential.lock";

/// Advisory lock that keeps at most one credential request outstanding per
/// flag directory, across processes.
pub struct RequestLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl RequestLock {
    pub fn open(flag_dir: &Path) -> Result<Self, ElevationError> {
        let path = flag_dir.join(LOCK_FILE_NAME);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(ElevationError::io("opening", &path))?;
        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Fails fast instead of queueing behind another request.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, ElevationError> {
        match self.lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(ElevationError::RequestInFlight {
                path: self.path.clone(),
            }),
            Err(source) => Err(ElevationError::Io {
                action: "locking",
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_turned_away() {
        let dir = TempDir::new().expect("tempdir");
        let mut first = RequestLock::open(dir.path()).expect("open first");
        let mut second = RequestLock::open(dir.path()).expect("open second");

        let guard = first.try_acquire().expect("first acquire");
        let err = second.try_acquire().expect_err("contended");
        assert!(matches!(err, ElevationError::RequestInFlight { .. }));

        drop(guard);
        second.try_acquire().expect("acquire after release");
    }
}
