//! Remote-access flow: find and start the remote tool, have an elevated
//! child apply a fresh password, then report the tool ID to the chat.

use crate::AppContext;
use anyhow::Context;
use remotehand_config::Config;
use remotehand_elevation::ActionOutcome;
use remotehand_elevation::ActionRequest;
use remotehand_elevation::Credential;
use remotehand_elevation::ElevatedActionLauncher;
use remotehand_elevation::LauncherOptions;
use remotehand_elevation::SystemElevator;
use remotehand_elevation::default_flag_dir;
use remotehand_notify::Report;
use remotehand_updater::build_http_client;
use remotehand_updater::download_executable;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

pub const GET_ID_ARG: &str = "--get-id";

/// The tool needs a moment after start before it accepts CLI queries.
const TOOL_STARTUP_WAIT: Duration = Duration::from_secs(3);
const ID_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_SETTLE: Duration = Duration::from_secs(3);
const FALLBACK_INSTALLER_NAME: &str = "remote-tool-installer";

/// Well-known install locations, probed in order.
pub fn candidate_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        let mut candidates = vec![
            PathBuf::from(r"C:\Program Files\AnyDesk\AnyDesk.exe"),
            PathBuf::from(r"C:\Program Files (x86)\AnyDesk\AnyDesk.exe"),
        ];
        if let Some(local) = dirs::data_local_dir() {
            candidates.push(local.join("AnyDesk").join("AnyDesk.exe"));
        }
        candidates
    } else {
        ["/usr/bin/anydesk", "/usr/local/bin/anydesk", "/opt/anydesk/anydesk"]
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }
}

pub fn locate_tool(explicit: Option<&Path>, candidates: &[PathBuf]) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("remote tool not found at {}", path.display());
    }
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| {
            anyhow::anyhow!(
                "remote tool not found; set [remote_tool] path in config.toml or pass --tool"
            )
        })
}

/// Fetches and runs the remote tool's installer when no install is found.
#[derive(Debug, Clone)]
pub struct ToolInstaller {
    http: reqwest::Client,
    url: String,
    download_dir: PathBuf,
    /// Wait after the installer exits before probing again.
    settle: Duration,
}

impl ToolInstaller {
    pub fn new(http: reqwest::Client, url: impl Into<String>, download_dir: PathBuf) -> Self {
        Self {
            http,
            url: url.into(),
            download_dir,
            settle: INSTALL_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// `None` when no installer URL is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        let Some(url) = &config.remote_tool.installer_url else {
            return Ok(None);
        };
        let download_dir = dirs::download_dir().unwrap_or_else(std::env::temp_dir);
        let http = build_http_client().context("building HTTP client")?;
        Ok(Some(Self::new(http, url.clone(), download_dir)))
    }

    fn installer_path(&self) -> PathBuf {
        let name = self
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_INSTALLER_NAME);
        self.download_dir.join(name)
    }

    /// Downloads the installer and runs it to completion. The installer's
    /// exit status is only logged; the caller looks for the tool afterwards.
    pub async fn install(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("creating {}", self.download_dir.display()))?;
        let dest = self.installer_path();
        tracing::info!("downloading remote tool installer from {}", self.url);
        let file = download_executable(&self.http, &self.url, &dest)
            .await
            .context("downloading remote tool installer")?;
        tracing::info!(
            "installer saved to {} ({} bytes, sha256 {})",
            file.path.display(),
            file.size,
            file.sha256
        );

        let status = tokio::process::Command::new(&file.path)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("running {}", file.path.display()))?;
        if status.success() {
            tracing::info!("installer finished");
        } else {
            tracing::warn!("installer exited with {status}");
        }
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

/// Like [`locate_tool`], but runs `installer` once when nothing is installed.
/// An explicit path that does not exist is an error, never an install.
pub async fn find_or_install_tool(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
    installer: Option<&ToolInstaller>,
) -> anyhow::Result<PathBuf> {
    let err = match locate_tool(explicit, candidates) {
        Ok(tool) => return Ok(tool),
        Err(err) => err,
    };
    let Some(installer) = installer.filter(|_| explicit.is_none()) else {
        return Err(err);
    };
    tracing::warn!("{err:#}; installing");
    installer.install().await?;
    locate_tool(None, candidates).context("remote tool still missing after running the installer")
}

pub fn launcher_options(config: &Config) -> anyhow::Result<LauncherOptions> {
    let helper = match &config.elevation.helper {
        Some(helper) => helper.clone(),
        None => std::env::current_exe().context("resolving the running executable")?,
    };
    Ok(LauncherOptions {
        flag_dir: config
            .elevation
            .flag_dir
            .clone()
            .unwrap_or_else(default_flag_dir),
        helper,
        poll_interval: config.elevation.poll_interval,
        timeout: config.elevation.timeout,
    })
}

fn start_tool(tool: &Path) -> anyhow::Result<()> {
    tokio::process::Command::new(tool)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("starting {}", tool.display()))?;
    Ok(())
}

/// Asks the tool for its address with `--get-id`. Failures are logged and
/// yield `None`; the report then says the ID is unknown.
pub async fn query_tool_id(tool: &Path, timeout: Duration) -> Option<String> {
    let output = tokio::process::Command::new(tool)
        .arg(GET_ID_ARG)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = match tokio::time::timeout(timeout, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::warn!("could not query remote tool ID: {err}");
            return None;
        }
        Err(_) => {
            tracing::warn!("remote tool ID query timed out after {}s", timeout.as_secs());
            return None;
        }
    };
    let id = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string);
    if id.is_none() {
        tracing::warn!("remote tool printed no ID (status {})", output.status);
    }
    id
}

/// The password goes into the report unless the child positively failed to
/// apply it. An unconfirmed request may still have succeeded.
pub fn credential_in_effect(outcome: &ActionOutcome) -> bool {
    !matches!(outcome, ActionOutcome::Completed(report) if !report.succeeded)
}

pub async fn run_remote_access(
    ctx: &AppContext,
    tool_override: Option<PathBuf>,
) -> anyhow::Result<ActionOutcome> {
    let explicit = tool_override
        .as_deref()
        .or(ctx.config.remote_tool.path.as_deref());
    let installer = ToolInstaller::from_config(&ctx.config)?;
    let tool = match find_or_install_tool(explicit, &candidate_paths(), installer.as_ref()).await {
        Ok(tool) => tool,
        Err(err) => {
            ctx.report_error(format!("{err:#}")).await;
            return Err(err);
        }
    };
    tracing::info!("remote tool at {}", tool.display());

    start_tool(&tool)?;
    tokio::time::sleep(TOOL_STARTUP_WAIT).await;

    let credential = Credential::generate();
    let reported_secret = credential.expose_secret().to_string();
    let request = ActionRequest::new(&tool, credential)?;
    let launcher = ElevatedActionLauncher::new(launcher_options(&ctx.config)?, Arc::new(SystemElevator));

    let outcome = match launcher.request_privileged_action(request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            ctx.report_error(format!("elevated password change failed: {err}"))
                .await;
            return Err(err).context("requesting elevated password change");
        }
    };

    let tool_id = query_tool_id(&tool, ID_QUERY_TIMEOUT).await;
    let state = outcome.best_known_state();
    ctx.report(Report::RemoteAccess {
        origin: ctx.origin(),
        tool_id: tool_id.clone(),
        credential: credential_in_effect(&outcome).then_some(reported_secret),
        state: state.to_string(),
    })
    .await;

    println!("Remote tool ID: {}", tool_id.as_deref().unwrap_or("unknown"));
    println!("Password: {state}");
    Ok(outcome)
}
