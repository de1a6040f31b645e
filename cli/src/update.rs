use crate::AppContext;
use anyhow::Context;
use remotehand_config::Config;
use remotehand_notify::Report;
use remotehand_updater::ReleaseClient;
use remotehand_updater::SwapStatus;
use remotehand_updater::SystemDetachedLauncher;
use remotehand_updater::UpdateOrchestrator;
use remotehand_updater::UpdateOutcome;
use remotehand_updater::UpdaterOptions;
use remotehand_updater::VERSION_FILE_NAME;
use remotehand_updater::Version;
use remotehand_updater::build_http_client;
use remotehand_updater::read_previous_swap_status;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Version assumed when `version.txt` is missing or unreadable.
pub fn fallback_version() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(vec![0]))
}

pub fn current_install_path() -> anyhow::Result<PathBuf> {
    std::env::current_exe().context("resolving the running executable")
}

pub fn version_file(config: &Config, install_path: &Path) -> PathBuf {
    match &config.update.version_file {
        Some(path) => path.clone(),
        None => install_path
            .parent()
            .map(|dir| dir.join(VERSION_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(VERSION_FILE_NAME)),
    }
}

pub fn build_orchestrator(
    config: &Config,
    install_path: PathBuf,
) -> anyhow::Result<UpdateOrchestrator> {
    let client = ReleaseClient::new(
        build_http_client().context("building HTTP client")?,
        config.update.api_base.clone(),
        config.update.repo.clone(),
    );
    let options = UpdaterOptions {
        enabled: config.updates_allowed(),
        version_file: version_file(config, &install_path),
        install_path,
        fallback_version: fallback_version(),
        asset_name: config.update.asset_name.clone(),
        settle: config.update.settle,
        exit_delay: config.update.exit_delay,
        pid: std::process::id(),
    };
    Ok(UpdateOrchestrator::new(
        options,
        client,
        Arc::new(SystemDetachedLauncher),
    ))
}

/// Reports what the replacement script left behind on the previous run.
pub async fn report_previous_swap(ctx: &AppContext, install_dir: &Path) -> Option<SwapStatus> {
    let status = match read_previous_swap_status(install_dir) {
        Ok(Some(status)) => status,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!("could not read previous update status: {err}");
            return None;
        }
    };
    if status == SwapStatus::Succeeded {
        tracing::info!("previous update {status}");
    } else {
        tracing::warn!("previous update {status}");
    }
    ctx.report(Report::Update {
        origin: ctx.origin(),
        summary: format!("Previous update {status}. Running {}.", fallback_version()),
    })
    .await;
    Some(status)
}

/// One update check. When a swap was scheduled the caller must return so
/// the process exits after the configured delay.
pub async fn run_update_check(
    ctx: &AppContext,
    install_path: PathBuf,
) -> anyhow::Result<UpdateOutcome> {
    let mut orchestrator = build_orchestrator(&ctx.config, install_path)?;
    let outcome = orchestrator.check_for_update().await;
    match &outcome {
        UpdateOutcome::Skipped => println!("Self-update skipped (dev mode or disabled)."),
        UpdateOutcome::UpToDate { local, latest } => {
            println!("RemoteHand {local} is up to date (latest release {latest}).");
        }
        UpdateOutcome::CheckFailed { reason } => {
            eprintln!("Update check failed: {reason}");
        }
        UpdateOutcome::DownloadFailed { reason } | UpdateOutcome::LaunchFailed { reason } => {
            eprintln!("Update failed: {reason}");
            ctx.report_error(format!("self-update failed: {reason}"))
                .await;
        }
        UpdateOutcome::SwapScheduled { from, package, .. } => {
            println!(
                "Updating RemoteHand {from} -> {}; restarting in {}s.",
                package.version,
                orchestrator.exit_delay().as_secs()
            );
            let report = Report::Update {
                origin: ctx.origin(),
                summary: format!("Updating {from} -> {}.", package.version),
            };
            announce_and_wait(ctx, report, orchestrator.exit_delay()).await;
            tracing::info!("exiting so the replacement script can swap the executable");
        }
    }
    Ok(outcome)
}

/// Sends `report` and returns once `exit_delay` has elapsed. A slow chat
/// send is cut off at the delay.
pub async fn announce_and_wait(ctx: &AppContext, report: Report, exit_delay: Duration) {
    let started = Instant::now();
    if tokio::time::timeout(exit_delay, ctx.report(report))
        .await
        .is_err()
    {
        tracing::warn!(
            "update report not sent within {}s; exiting anyway",
            exit_delay.as_secs()
        );
    }
    tokio::time::sleep_until(started + exit_delay).await;
}

/// Default command: previous swap report, then one update check.
pub async fn run_startup(ctx: &AppContext) -> anyhow::Result<UpdateOutcome> {
    if ctx.config.is_first_run() {
        eprintln!(
            "This machine is not set up yet. Run `remotehand setup --store <store> --location <location>`."
        );
    }
    let install_path = current_install_path()?;
    if let Some(install_dir) = install_path.parent() {
        report_previous_swap(ctx, install_dir).await;
    }
    run_update_check(ctx, install_path).await
}
