//! The completion flag: a small file the elevated child writes as its last
//! action and the parent consumes exactly once.

use crate::ElevationError;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const FLAG_FILE_NAME: &str = "remotehand-credential.flag";
pub const ELEVATED_LOG_FILE_NAME: &str = "remotehand-elevated.log";
#[cfg(unix)]
const FLAG_FILE_MODE: u32 = 0o644;

/// Directory shared between the interactive user and the elevated child.
/// The elevated process may run with a different profile, so the per-user
/// home cannot be used here.
pub fn default_flag_dir() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var_os("PUBLIC")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Users\Public"))
            .join("RemoteHand")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp").join("remotehand")
    }
}

pub fn flag_path(flag_dir: &Path) -> PathBuf {
    flag_dir.join(FLAG_FILE_NAME)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub request_id: Uuid,
    /// False when the child gave up before running the tool.
    pub attempted: bool,
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub detail: String,
    pub finished_at: DateTime<Utc>,
}

impl CompletionReport {
    pub fn not_attempted(request_id: Uuid, detail: impl Into<String>) -> Self {
        Self {
            request_id,
            attempted: false,
            succeeded: false,
            exit_code: None,
            detail: detail.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn attempted(
        request_id: Uuid,
        succeeded: bool,
        exit_code: Option<i32>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            attempted: true,
            succeeded,
            exit_code,
            detail: detail.into(),
            finished_at: Utc::now(),
        }
    }
}

/// What the parent found at the flag path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagContents {
    Report(CompletionReport),
    /// The flag exists but its body could not be parsed. Existence alone
    /// still means the child finished.
    Unreadable,
}

/// Writes the flag through a temp file in the same directory so readers never
/// observe a partial report. The flag is left readable by everyone because the
/// writer is usually root and the reader is not.
pub fn write_flag(flag_dir: &Path, report: &CompletionReport) -> Result<(), ElevationError> {
    fs::create_dir_all(flag_dir).map_err(ElevationError::io("creating", flag_dir))?;
    let path = flag_path(flag_dir);
    let json = serde_json::to_vec_pretty(report)?;
    let mut tmp = NamedTempFile::new_in(flag_dir)
        .map_err(ElevationError::io("creating temp flag in", flag_dir))?;
    tmp.write_all(&json)
        .map_err(ElevationError::io("writing", tmp.path()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(FLAG_FILE_MODE))
            .map_err(ElevationError::io("setting permissions on", tmp.path()))?;
    }
    tmp.persist(&path)
        .map_err(|err| err.error)
        .map_err(ElevationError::io("persisting", &path))?;
    Ok(())
}

pub fn read_flag(flag_dir: &Path) -> Result<Option<FlagContents>, ElevationError> {
    let path = flag_path(flag_dir);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ElevationError::Io {
                action: "reading",
                path,
                source,
            });
        }
    };
    Ok(Some(match serde_json::from_slice::<CompletionReport>(&bytes) {
        Ok(report) => FlagContents::Report(report),
        Err(err) => {
            tracing::warn!("completion flag {} is not a report: {err}", path.display());
            FlagContents::Unreadable
        }
    }))
}

/// Removes the flag. Returns whether a file was actually deleted.
pub fn clear_flag(flag_dir: &Path) -> Result<bool, ElevationError> {
    let path = flag_path(flag_dir);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ElevationError::Io {
            action: "removing",
            path,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn written_report_reads_back() {
        let dir = TempDir::new().expect("tempdir");
        let report = CompletionReport::attempted(Uuid::new_v4(), true, Some(0), "ok");

        write_flag(dir.path(), &report).expect("write flag");

        assert_eq!(
            read_flag(dir.path()).expect("read flag"),
            Some(FlagContents::Report(report))
        );
    }

    #[test]
    fn garbage_flag_counts_as_unreadable_completion() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(flag_path(dir.path()), b"done").expect("write garbage");

        assert_eq!(
            read_flag(dir.path()).expect("read flag"),
            Some(FlagContents::Unreadable)
        );
    }

    #[test]
    fn clearing_missing_flag_is_not_an_error() {
        let dir = TempDir::new().expect("tempdir");
        assert!(!clear_flag(dir.path()).expect("clear"));
        fs::write(flag_path(dir.path()), b"{}").expect("write flag");
        assert!(clear_flag(dir.path()).expect("clear"));
        assert_eq!(read_flag(dir.path()).expect("read"), None);
    }

    #[cfg(unix)]
    #[test]
    fn flag_is_readable_by_other_users() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        write_flag(dir.path(), &CompletionReport::not_attempted(Uuid::nil(), "no target"))
            .expect("write flag");

        let mode = fs::metadata(flag_path(dir.path()))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, FLAG_FILE_MODE);
        assert_ne!(mode & 0o044, 0);
    }

    #[test]
    fn write_creates_missing_directory() {
        let root = TempDir::new().expect("tempdir");
        let dir = root.path().join("shared");
        write_flag(&dir, &CompletionReport::not_attempted(Uuid::nil(), "no target"))
            .expect("write flag");
        assert!(flag_path(&dir).exists());
    }
}
