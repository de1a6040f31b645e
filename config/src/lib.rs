mod config_toml;
mod edit;

pub use config_toml::ConfigToml;
pub use config_toml::ElevationToml;
pub use config_toml::RdpToml;
pub use config_toml::RemoteToolToml;
pub use config_toml::TelegramToml;
pub use config_toml::UpdateToml;
pub use edit::write_identity;

use remotehand_elevation::default_configure_args;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_TOML_FILE: &str = "config.toml";

/// Set to `1` while iterating locally. Disables the self-update check so a
/// development build is never replaced by a release download.
pub const DEV_MODE_ENV_VAR: &str = "REMOTEHAND_DEV_MODE";
pub const TELEGRAM_TOKEN_ENV_VAR: &str = "TELEGRAM_TOKEN";
pub const TELEGRAM_CHAT_ID_ENV_VAR: &str = "TELEGRAM_CHAT_ID";

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_RDP_PORT: u16 = 3389;
pub const DEFAULT_UPDATE_REPO: &str = "ShevchukVI/RemoteHand";
pub const DEFAULT_RELEASE_API_BASE: &str = "https://api.github.com";
/// AnyDesk only publishes a standalone installer for Windows.
#[cfg(windows)]
pub const DEFAULT_TOOL_INSTALLER_URL: Option<&str> =
    Some("https://download.anydesk.com/AnyDesk.exe");
#[cfg(not(windows))]
pub const DEFAULT_TOOL_INSTALLER_URL: Option<&str> = None;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
const DEFAULT_ELEVATION_TIMEOUT_SECS: u64 = 180;
const DEFAULT_SETTLE_SECS: u64 = 2;
const DEFAULT_EXIT_DELAY_SECS: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error while {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config value `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Values read from the process environment that override `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub dev_mode: bool,
}

impl EnvOverrides {
    pub fn from_process_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            telegram_token: non_empty(TELEGRAM_TOKEN_ENV_VAR),
            telegram_chat_id: non_empty(TELEGRAM_CHAT_ID_ENV_VAR),
            dev_mode: std::env::var(DEV_MODE_ENV_VAR).ok().as_deref() == Some("1"),
        }
    }
}

/// Where this machine sits in the fleet; included in every chat report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub store: Option<String>,
    pub location: Option<String>,
    pub user_name: Option<String>,
}

impl Identity {
    pub fn label(&self) -> String {
        let store = self.store.as_deref().unwrap_or("unknown");
        let location = self.location.as_deref().unwrap_or("unknown");
        format!("{store} / {location}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteToolConfig {
    /// Explicit tool location. When unset the well-known install paths are
    /// probed.
    pub path: Option<PathBuf>,
    pub configure_args: Vec<String>,
    /// Downloaded and run when no tool is found and no explicit path is set.
    pub installer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationConfig {
    pub flag_dir: Option<PathBuf>,
    /// Image re-invoked with elevation. Defaults to the running executable.
    pub helper: Option<PathBuf>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub repo: String,
    pub api_base: String,
    pub asset_name: String,
    pub version_file: Option<PathBuf>,
    pub settle: Duration,
    pub exit_delay: Duration,
}

/// Fully resolved configuration, built once at startup and handed to the
/// components that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub home: PathBuf,
    pub identity: Identity,
    pub telegram: Option<TelegramConfig>,
    pub rdp: Option<RdpConfig>,
    pub remote_tool: RemoteToolConfig,
    pub elevation: ElevationConfig,
    pub update: UpdateConfig,
    pub dev_mode: bool,
}

impl Config {
    /// Loads `<home>/config.toml` and applies the process environment.
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        Self::load_with_overrides(home, EnvOverrides::from_process_env())
    }

    pub fn load_with_overrides(home: &Path, env: EnvOverrides) -> Result<Self, ConfigError> {
        let toml = load_config_toml(home)?;
        Self::from_toml(home, toml, env)
    }

    pub fn from_toml(
        home: &Path,
        cfg: ConfigToml,
        env: EnvOverrides,
    ) -> Result<Self, ConfigError> {
        let ConfigToml {
            store,
            location,
            user_name,
            telegram,
            rdp,
            remote_tool,
            elevation,
            update,
        } = cfg;

        let telegram = telegram.unwrap_or_default();
        let token = env.telegram_token.or(telegram.token).filter(|t| !t.is_empty());
        let chat_id = env
            .telegram_chat_id
            .or(telegram.chat_id)
            .filter(|c| !c.is_empty());
        let telegram = match (token, chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                token,
                chat_id,
                api_base: telegram
                    .api_base
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            }),
            _ => None,
        };

        let rdp = rdp.and_then(|rdp| {
            rdp.host.map(|host| RdpConfig {
                host,
                port: rdp.port.unwrap_or(DEFAULT_RDP_PORT),
            })
        });

        let remote_tool = remote_tool.unwrap_or_default();
        let remote_tool = RemoteToolConfig {
            path: remote_tool.path,
            configure_args: remote_tool
                .configure_args
                .unwrap_or_else(default_configure_args),
            installer_url: match remote_tool.installer_url {
                Some(url) if url.trim().is_empty() => None,
                Some(url) => Some(url),
                None => DEFAULT_TOOL_INSTALLER_URL.map(str::to_string),
            },
        };

        let elevation = elevation.unwrap_or_default();
        let poll_interval_secs = elevation
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let timeout_secs = elevation
            .timeout_secs
            .unwrap_or(DEFAULT_ELEVATION_TIMEOUT_SECS);
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "elevation.poll_interval_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if timeout_secs < poll_interval_secs {
            return Err(ConfigError::Invalid {
                key: "elevation.timeout_secs",
                message: format!("must not be shorter than the poll interval ({poll_interval_secs}s)"),
            });
        }
        let elevation = ElevationConfig {
            flag_dir: elevation.flag_dir,
            helper: elevation.helper,
            poll_interval: Duration::from_secs(poll_interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        };

        let update = update.unwrap_or_default();
        let update = UpdateConfig {
            enabled: update.enabled.unwrap_or(true),
            repo: update.repo.unwrap_or_else(|| DEFAULT_UPDATE_REPO.to_string()),
            api_base: update
                .api_base
                .unwrap_or_else(|| DEFAULT_RELEASE_API_BASE.to_string()),
            asset_name: update.asset_name.unwrap_or_else(default_asset_name),
            version_file: update.version_file,
            settle: Duration::from_secs(update.settle_secs.unwrap_or(DEFAULT_SETTLE_SECS)),
            exit_delay: Duration::from_secs(
                update.exit_delay_secs.unwrap_or(DEFAULT_EXIT_DELAY_SECS),
            ),
        };

        Ok(Self {
            home: home.to_path_buf(),
            identity: Identity {
                store: store.filter(|s| !s.trim().is_empty()),
                location: location.filter(|s| !s.trim().is_empty()),
                user_name: user_name.filter(|s| !s.trim().is_empty()),
            },
            telegram,
            rdp,
            remote_tool,
            elevation,
            update,
            dev_mode: env.dev_mode,
        })
    }

    /// True until `setup` has recorded both the store and the location.
    pub fn is_first_run(&self) -> bool {
        self.identity.store.is_none() || self.identity.location.is_none()
    }

    /// "store / location" label used in chat reports.
    pub fn identity(&self) -> String {
        self.identity.label()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("log")
    }

    /// Self-update runs only outside dev mode and when not disabled in config.
    pub fn updates_allowed(&self) -> bool {
        self.update.enabled && !self.dev_mode
    }
}

fn default_asset_name() -> String {
    if cfg!(windows) {
        "RemoteHand.exe".to_string()
    } else {
        "remotehand".to_string()
    }
}

/// Reads `<home>/config.toml`. A missing file yields the empty config.
pub fn load_config_toml(home: &Path) -> Result<ConfigToml, ConfigError> {
    let path = home.join(CONFIG_TOML_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!("no config at {}; using defaults", path.display());
            return Ok(ConfigToml::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                action: "reading",
                path,
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_resolves_to_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = Config::load_with_overrides(home.path(), EnvOverrides::default())
            .expect("load defaults");

        assert!(config.is_first_run());
        assert_eq!(config.telegram, None);
        assert_eq!(config.rdp, None);
        assert_eq!(config.elevation.poll_interval, Duration::from_secs(1));
        assert_eq!(config.elevation.timeout, Duration::from_secs(180));
        assert_eq!(config.update.repo, DEFAULT_UPDATE_REPO);
        assert_eq!(config.update.settle, Duration::from_secs(2));
        assert_eq!(config.remote_tool.configure_args, default_configure_args());
        assert_eq!(
            config.remote_tool.installer_url.as_deref(),
            DEFAULT_TOOL_INSTALLER_URL
        );
        assert!(config.updates_allowed());
    }

    #[test]
    fn parses_full_file() {
        let home = TempDir::new().expect("tempdir");
        std::fs::write(
            home.path().join(CONFIG_TOML_FILE),
            r#"
store = "12"
location = "Dialog - Till"

[telegram]
token = "123:abc"
chat_id = "-100"

[rdp]
host = "rdp.example.com"

[remote_tool]
installer_url = ""

[elevation]
poll_interval_secs = 2
timeout_secs = 60

[update]
enabled = false
asset_name = "custom.bin"
"#,
        )
        .expect("write config");

        let config = Config::load_with_overrides(home.path(), EnvOverrides::default())
            .expect("load config");

        assert!(!config.is_first_run());
        assert_eq!(config.identity.label(), "12 / Dialog - Till");
        assert_eq!(
            config.telegram,
            Some(TelegramConfig {
                token: "123:abc".to_string(),
                chat_id: "-100".to_string(),
                api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            })
        );
        assert_eq!(
            config.rdp,
            Some(RdpConfig {
                host: "rdp.example.com".to_string(),
                port: DEFAULT_RDP_PORT,
            })
        );
        assert_eq!(config.elevation.poll_interval, Duration::from_secs(2));
        assert_eq!(config.elevation.timeout, Duration::from_secs(60));
        assert_eq!(config.remote_tool.installer_url, None);
        assert_eq!(config.update.asset_name, "custom.bin");
        assert!(!config.updates_allowed());
    }

    #[test]
    fn environment_overrides_telegram_and_dev_mode() {
        let cfg = ConfigToml {
            telegram: Some(TelegramToml {
                token: Some("file-token".to_string()),
                chat_id: Some("file-chat".to_string()),
                api_base: None,
            }),
            ..Default::default()
        };
        let env = EnvOverrides {
            telegram_token: Some("env-token".to_string()),
            telegram_chat_id: None,
            dev_mode: true,
        };

        let config = Config::from_toml(Path::new("/home"), cfg, env).expect("resolve");

        let telegram = config.telegram.as_ref().expect("telegram configured");
        assert_eq!(telegram.token, "env-token");
        assert_eq!(telegram.chat_id, "file-chat");
        assert!(config.dev_mode);
        assert!(!config.updates_allowed());
    }

    #[test]
    fn telegram_requires_token_and_chat() {
        let env = EnvOverrides {
            telegram_token: Some("token-only".to_string()),
            ..Default::default()
        };
        let config =
            Config::from_toml(Path::new("/home"), ConfigToml::default(), env).expect("resolve");
        assert_eq!(config.telegram, None);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cfg = ConfigToml {
            elevation: Some(ElevationToml {
                poll_interval_secs: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = Config::from_toml(Path::new("/home"), cfg, EnvOverrides::default())
            .expect_err("zero interval");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "elevation.poll_interval_secs",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let home = TempDir::new().expect("tempdir");
        std::fs::write(home.path().join(CONFIG_TOML_FILE), "store = [").expect("write");
        let err = load_config_toml(home.path()).expect_err("parse error");
        assert!(err.to_string().contains(CONFIG_TOML_FILE), "{err}");
    }
}
