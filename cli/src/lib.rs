//! Library half of the `remotehand` binary: subcommand implementations and
//! the process-wide setup they share.

mod context;
mod elevated;
mod instance;
mod logging;
mod rdp;
mod remote_tool;
mod setup;
mod update;

pub use context::AppContext;
pub use elevated::run_elevated_child;
pub use instance::AlreadyRunning;
pub use instance::INSTANCE_LOCK_FILE_NAME;
pub use instance::InstanceLock;
pub use logging::LOG_FILE_NAME;
pub use logging::init_logging;
pub use rdp::close_rdp_command;
pub use rdp::rdp_command;
pub use rdp::run_close_rdp;
pub use rdp::run_rdp;
pub use remote_tool::ToolInstaller;
pub use remote_tool::candidate_paths;
pub use remote_tool::find_or_install_tool;
pub use remote_tool::launcher_options;
pub use remote_tool::locate_tool;
pub use remote_tool::run_remote_access;
pub use setup::SetupArgs;
pub use setup::run_setup;
pub use update::announce_and_wait;
pub use update::current_install_path;
pub use update::report_previous_swap;
pub use update::run_startup;
pub use update::run_update_check;
