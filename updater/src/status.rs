use crate::UpdateError;
use crate::UpdateState;
use crate::paths::STATUS_FILE_NAME;
use std::io::ErrorKind;
use std::path::Path;

/// Outcome the replacement script recorded for the previous swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStatus {
    Succeeded,
    RolledBack,
    BackupFailed,
    Unknown(String),
}

impl SwapStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "succeeded" => Self::Succeeded,
            "rolled-back" => Self::RolledBack,
            "backup-failed" => Self::BackupFailed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The terminal state the script reached, when it maps onto one.
    pub fn final_state(&self) -> Option<UpdateState> {
        match self {
            Self::Succeeded => Some(UpdateState::SwapSucceeded),
            Self::RolledBack => Some(UpdateState::SwapFailedRolledBack),
            Self::BackupFailed | Self::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::RolledBack => f.write_str("rolled back to the previous version"),
            Self::BackupFailed => f.write_str("aborted before swapping (backup failed)"),
            Self::Unknown(raw) => write!(f, "unknown status `{raw}`"),
        }
    }
}

/// Reads and removes the status the last replacement script left in
/// `install_dir`. Returns `None` when no swap happened since the last start.
pub fn read_previous_swap_status(install_dir: &Path) -> Result<Option<SwapStatus>, UpdateError> {
    let path = install_dir.join(STATUS_FILE_NAME);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(UpdateError::Io {
                action: "reading",
                path,
                source,
            });
        }
    };
    std::fs::remove_file(&path).map_err(UpdateError::io("removing", &path))?;
    Ok(Some(SwapStatus::parse(&raw)))
}
