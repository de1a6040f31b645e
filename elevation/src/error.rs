use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("target executable {} does not exist", path.display())]
    TargetMissing { path: PathBuf },

    #[error("credential is missing; set it through the environment before requesting elevation")]
    CredentialMissing,

    #[error("another credential request is already in flight (lock held on {})", path.display())]
    RequestInFlight { path: PathBuf },

    #[error("failed to determine whether the process is elevated: {0}")]
    ElevationCheck(String),

    #[error("failed to launch the elevation helper {}: {source}", helper.display())]
    Launch {
        helper: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize completion report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ElevationError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}
