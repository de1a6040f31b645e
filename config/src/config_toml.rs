//! On-disk shape of `config.toml`. Every field is optional so a partial file
//! (or none at all) still loads; defaults are applied in [`crate::Config`].

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramToml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdp: Option<RdpToml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_tool: Option<RemoteToolToml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<ElevationToml>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateToml>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TelegramToml {
    pub token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RdpToml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteToolToml {
    pub path: Option<PathBuf>,
    pub configure_args: Option<Vec<String>>,
    /// Installer fetched when the tool is not installed. An empty string
    /// disables the download.
    pub installer_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ElevationToml {
    pub flag_dir: Option<PathBuf>,
    pub helper: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdateToml {
    pub enabled: Option<bool>,
    pub repo: Option<String>,
    pub api_base: Option<String>,
    pub asset_name: Option<String>,
    pub version_file: Option<PathBuf>,
    pub settle_secs: Option<u64>,
    pub exit_delay_secs: Option<u64>,
}
