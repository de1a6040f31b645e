use crate::UpdateError;
use crate::Version;
use futures::StreamExt;
use sha2::Digest;
use sha2::Sha256;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// A downloaded replacement executable waiting to be swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePackage {
    pub version: Version,
    pub download_path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Size and digest of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Streams `url` into a temp file next to `candidate` and persists it there
/// only once the body is complete. Nothing is left behind on failure.
pub async fn download_candidate(
    http: &reqwest::Client,
    url: &str,
    version: Version,
    candidate: &Path,
) -> Result<UpdatePackage, UpdateError> {
    let file = download_executable(http, url, candidate).await?;
    tracing::info!(
        "downloaded {version} ({} bytes, sha256 {}) to {}",
        file.size,
        file.sha256,
        file.path.display()
    );
    Ok(UpdatePackage {
        version,
        download_path: file.path,
        sha256: file.sha256,
        size: file.size,
    })
}

/// Downloads `url` to `dest` and marks it executable. The body is streamed
/// into a temp file in the same directory and only persisted once complete
/// and non-empty.
pub async fn download_executable(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<DownloadedFile, UpdateError> {
    let dir = dest
        .parent()
        .ok_or_else(|| UpdateError::InvalidInstallPath {
            path: dest.to_path_buf(),
        })?;

    let response = http
        .get(url)
        .send()
        .await
        .map_err(UpdateError::http(url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(UpdateError::Status {
            url: url.to_string(),
            status,
        });
    }

    let tmp = tempfile::Builder::new()
        .prefix(".remotehand-download")
        .tempfile_in(dir)
        .map_err(UpdateError::io("creating download file in", dir))?;
    let std_file = tmp
        .as_file()
        .try_clone()
        .map_err(UpdateError::io("opening", tmp.path()))?;
    let mut file = tokio::fs::File::from_std(std_file);

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(UpdateError::http(url))?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(UpdateError::io("writing", tmp.path()))?;
    }
    file.flush()
        .await
        .map_err(UpdateError::io("flushing", tmp.path()))?;
    file.sync_all()
        .await
        .map_err(UpdateError::io("syncing", tmp.path()))?;
    drop(file);

    if size == 0 {
        return Err(UpdateError::EmptyDownload {
            url: url.to_string(),
        });
    }

    persist_executable(tmp, dest)?;
    Ok(DownloadedFile {
        path: dest.to_path_buf(),
        sha256: format!("{:x}", hasher.finalize()),
        size,
    })
}

fn persist_executable(tmp: NamedTempFile, candidate: &Path) -> Result<(), UpdateError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(UpdateError::io("marking executable", tmp.path()))?;
    }
    tmp.persist(candidate)
        .map_err(|err| err.error)
        .map_err(UpdateError::io("persisting", candidate))?;
    Ok(())
}
