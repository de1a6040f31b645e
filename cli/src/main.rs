use anyhow::Context;
use clap::Parser;
use remotehand_cli::AppContext;
use remotehand_cli::InstanceLock;
use remotehand_cli::LOG_FILE_NAME;
use remotehand_cli::SetupArgs;
use remotehand_cli::current_install_path;
use remotehand_cli::init_logging;
use remotehand_cli::run_close_rdp;
use remotehand_cli::run_elevated_child;
use remotehand_cli::run_rdp;
use remotehand_cli::run_remote_access;
use remotehand_cli::run_setup;
use remotehand_cli::run_startup;
use remotehand_cli::run_update_check;
use remotehand_config::Config;
use remotehand_elevation::ChildInvocation;
use remotehand_utils_home_dir::ensure_remotehand_home;
use std::path::PathBuf;
use uuid::Uuid;

/// RemoteHand support helper
///
/// Without a subcommand, reports the previous self-update and checks for a
/// new release.
#[derive(Debug, Parser)]
#[clap(
    author,
    version,
    name = "remotehand",
    bin_name = "remotehand",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Elevated child: apply the credential from the environment to TARGET.
    #[arg(long = "set-credential", value_name = "TARGET", hide = true, requires = "request_id")]
    set_credential: Option<PathBuf>,

    #[arg(long = "request-id", value_name = "UUID", hide = true, requires = "set_credential")]
    request_id: Option<Uuid>,

    #[arg(long = "credential-pipe", value_name = "NAME", hide = true, requires = "set_credential")]
    credential_pipe: Option<String>,

    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// Check for a newer release and install it.
    CheckUpdate,

    /// Start the remote tool with a fresh password and report its ID.
    RemoteAccess {
        /// Remote tool executable; overrides `[remote_tool] path`.
        #[arg(long, value_name = "PATH")]
        tool: Option<PathBuf>,
    },

    /// Open the configured RDP endpoint.
    Rdp,

    /// Terminate all running RDP client sessions.
    CloseRdp,

    /// Record the store and location of this machine.
    Setup(SetupArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let (Some(target), Some(request_id)) = (cli.set_credential, cli.request_id) {
        let code = run_elevated_child(ChildInvocation {
            target,
            request_id,
            credential_pipe: cli.credential_pipe,
        })
        .await;
        std::process::exit(code);
    }

    cli_main(cli.subcommand).await
}

async fn cli_main(subcommand: Option<Subcommand>) -> anyhow::Result<()> {
    let home = ensure_remotehand_home().context("resolving RemoteHand home")?;
    let config = Config::load(&home).context("loading configuration")?;
    let _log_guard = init_logging(&config.log_dir(), LOG_FILE_NAME, true)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "remotehand starting");

    if let Some(Subcommand::Setup(args)) = subcommand {
        return run_setup(&home, args);
    }

    let mut instance = InstanceLock::open(&home)?;
    let _instance_guard = instance.try_acquire()?;
    let ctx = AppContext::new(config)?;

    match subcommand {
        None => {
            run_startup(&ctx).await?;
        }
        Some(Subcommand::CheckUpdate) => {
            run_update_check(&ctx, current_install_path()?).await?;
        }
        Some(Subcommand::RemoteAccess { tool }) => {
            run_remote_access(&ctx, tool).await?;
        }
        Some(Subcommand::Rdp) => run_rdp(&ctx).await?,
        Some(Subcommand::CloseRdp) => {
            run_close_rdp(&ctx).await?;
        }
        Some(Subcommand::Setup(_)) => {}
    }
    Ok(())
}
