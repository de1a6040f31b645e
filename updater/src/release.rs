use crate::UpdateError;
use crate::Version;
use serde::Deserialize;
use std::time::Duration;

const INDEX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    pub fn version(&self) -> Result<Version, UpdateError> {
        Ok(Version::parse(&self.tag_name)?)
    }

    /// Asset lookup is case-insensitive; release uploads are not consistent
    /// about `RemoteHand.exe` vs `remotehand.exe`.
    pub fn asset(&self, name: &str) -> Result<&ReleaseAsset, UpdateError> {
        self.assets
            .iter()
            .find(|asset| asset.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| UpdateError::AssetMissing {
                tag: self.tag_name.clone(),
                asset: name.to_string(),
            })
    }
}

/// Client for a GitHub-style `releases/latest` endpoint.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
    repo: String,
}

impl ReleaseClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            repo: repo.into(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo
        )
    }

    pub async fn latest_release(&self) -> Result<Release, UpdateError> {
        let url = self.latest_release_url();
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(INDEX_TIMEOUT)
            .send()
            .await
            .map_err(UpdateError::http(&url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Status { url, status });
        }
        response
            .json::<Release>()
            .await
            .map_err(UpdateError::http(&url))
    }
}

/// Shared HTTP client with the user agent GitHub requires.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("remotehand/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(INDEX_TIMEOUT)
        .build()
}
