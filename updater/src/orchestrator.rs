use crate::DetachedLauncher;
use crate::ReleaseClient;
use crate::ReplacementScript;
use crate::UpdateError;
use crate::UpdatePackage;
use crate::UpdatePaths;
use crate::Version;
use crate::download::download_candidate;
use crate::marker::read_local_version;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    CheckingVersion,
    UpToDate,
    Downloading,
    DownloadFailed,
    ReadyToSwap,
    SwapInProgress,
    /// Reached by the replacement script after this process exited.
    SwapSucceeded,
    /// Reached by the replacement script after this process exited.
    SwapFailedRolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Dev mode or updates disabled; nothing was read or fetched.
    Skipped,
    UpToDate { local: Version, latest: Version },
    CheckFailed { reason: String },
    DownloadFailed { reason: String },
    /// The candidate was downloaded but the script could not be started.
    LaunchFailed { reason: String },
    /// The replacement script is running. The caller must exit after
    /// [`UpdaterOptions::exit_delay`].
    SwapScheduled {
        from: Version,
        package: UpdatePackage,
        script: PathBuf,
    },
}

impl UpdateOutcome {
    /// True when the caller has to exit so the swap can proceed.
    pub fn initiated(&self) -> bool {
        matches!(self, Self::SwapScheduled { .. })
    }
}

#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    /// False in dev mode or when disabled in config.
    pub enabled: bool,
    pub install_path: PathBuf,
    pub version_file: PathBuf,
    /// Version assumed when the marker is missing or unreadable.
    pub fallback_version: Version,
    pub asset_name: String,
    pub settle: Duration,
    pub exit_delay: Duration,
    /// Process the script terminates before swapping.
    pub pid: u32,
}

pub struct UpdateOrchestrator {
    options: UpdaterOptions,
    client: ReleaseClient,
    launcher: Arc<dyn DetachedLauncher>,
    state: UpdateState,
    history: Vec<UpdateState>,
}

impl UpdateOrchestrator {
    pub fn new(
        options: UpdaterOptions,
        client: ReleaseClient,
        launcher: Arc<dyn DetachedLauncher>,
    ) -> Self {
        Self {
            options,
            client,
            launcher,
            state: UpdateState::Idle,
            history: vec![UpdateState::Idle],
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Every state visited since construction, starting with `Idle`.
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    pub fn exit_delay(&self) -> Duration {
        self.options.exit_delay
    }

    fn transition(&mut self, next: UpdateState) {
        tracing::info!(from = ?self.state, to = ?next, "update state");
        self.state = next;
        self.history.push(next);
    }

    /// Runs one version check and, when a newer release exists, downloads it
    /// and schedules the swap. Never retries.
    pub async fn check_for_update(&mut self) -> UpdateOutcome {
        if !self.options.enabled {
            tracing::info!("self-update disabled; skipping version check");
            return UpdateOutcome::Skipped;
        }

        self.transition(UpdateState::CheckingVersion);
        let local = read_local_version(&self.options.version_file, &self.options.fallback_version);
        let fetched = self.client.latest_release().await;
        let release = match fetched {
            Ok(release) => release,
            Err(err) => return self.check_failed(err),
        };
        let latest = match release.version() {
            Ok(latest) => latest,
            Err(err) => return self.check_failed(err),
        };

        if !latest.is_newer_than(&local) {
            tracing::info!("running {local}; latest release is {latest}");
            self.transition(UpdateState::UpToDate);
            return UpdateOutcome::UpToDate { local, latest };
        }

        tracing::info!("update available: {local} -> {latest}");
        self.transition(UpdateState::Downloading);
        let paths = match UpdatePaths::for_install(&self.options.install_path) {
            Ok(paths) => paths,
            Err(err) => return self.download_failed(err),
        };
        let url = match release.asset(&self.options.asset_name) {
            Ok(asset) => asset.browser_download_url.clone(),
            Err(err) => return self.download_failed(err),
        };
        let downloaded =
            download_candidate(self.client.http(), &url, latest, &paths.candidate).await;
        let package = match downloaded {
            Ok(package) => package,
            Err(err) => return self.download_failed(err),
        };

        self.transition(UpdateState::ReadyToSwap);
        let script = ReplacementScript::new(paths.clone(), self.options.pid, self.options.settle);
        let script_path = match script.write() {
            Ok(path) => path,
            Err(err) => return self.launch_failed(&paths, err),
        };
        if let Err(source) = self.launcher.launch(&script_path) {
            return self.launch_failed(
                &paths,
                UpdateError::Launch {
                    path: script_path,
                    source,
                },
            );
        }

        self.transition(UpdateState::SwapInProgress);
        UpdateOutcome::SwapScheduled {
            from: local,
            package,
            script: script_path,
        }
    }

    fn check_failed(&mut self, err: UpdateError) -> UpdateOutcome {
        tracing::warn!("version check failed: {err}");
        self.transition(UpdateState::Idle);
        UpdateOutcome::CheckFailed {
            reason: err.to_string(),
        }
    }

    fn download_failed(&mut self, err: UpdateError) -> UpdateOutcome {
        tracing::warn!("update download failed: {err}");
        self.transition(UpdateState::DownloadFailed);
        UpdateOutcome::DownloadFailed {
            reason: err.to_string(),
        }
    }

    /// Removes the candidate and script so the next start begins clean.
    fn launch_failed(&mut self, paths: &UpdatePaths, err: UpdateError) -> UpdateOutcome {
        tracing::warn!("could not start replacement script: {err}");
        for leftover in [&paths.candidate, &paths.script] {
            if let Err(remove_err) = std::fs::remove_file(leftover)
                && remove_err.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!("failed to remove {}: {remove_err}", leftover.display());
            }
        }
        self.transition(UpdateState::Idle);
        UpdateOutcome::LaunchFailed {
            reason: err.to_string(),
        }
    }
}
