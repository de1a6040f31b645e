use crate::version::ParseVersionError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("release tag is not a version: {0}")]
    InvalidTag(#[from] ParseVersionError),

    #[error("release {tag} has no asset named {asset}")]
    AssetMissing { tag: String, asset: String },

    #[error("download from {url} was empty")]
    EmptyDownload { url: String },

    #[error("install path {} has no parent directory or file name", path.display())]
    InvalidInstallPath { path: PathBuf },

    #[error("failed to launch replacement script {}: {source}", path.display())]
    Launch {
        path: PathBuf,
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
}

impl UpdateError {
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

    pub(crate) fn http(url: &str) -> impl FnOnce(reqwest::Error) -> Self {
        let url = url.to_string();
        move |source| Self::Http { url, source }
    }
}
