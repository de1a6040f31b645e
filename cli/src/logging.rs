use anyhow::Context;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_FILE_NAME: &str = "remotehand.log";

const DEFAULT_FILTER: &str = "remotehand=info,remotehand_cli=info,remotehand_config=info,\
remotehand_elevation=info,remotehand_notify=info,remotehand_updater=info";

/// Installs the global subscriber: an appending file layer in `log_dir` and,
/// for interactive runs, a stderr layer that only shows warnings and errors.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging(log_dir: &Path, file_name: &str, stderr: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let log_file = open_log_file(&log_dir.join(file_name))?;
    let (non_blocking, guard) = non_blocking(log_file);

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_ansi(false)
        .with_filter(env_filter());

    let stderr_layer = stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(guard)
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    // Owner-only on Unix. The elevated log lives in a shared directory.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
