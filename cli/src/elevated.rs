use crate::logging::init_logging;
use remotehand_config::Config;
use remotehand_elevation::ChildInvocation;
use remotehand_elevation::ELEVATED_LOG_FILE_NAME;
use remotehand_elevation::PrivilegedActionRunner;
use remotehand_elevation::default_configure_args;
use remotehand_elevation::default_flag_dir;
use remotehand_utils_home_dir::find_remotehand_home;

/// Entry point of the elevated child. Returns the process exit code.
///
/// The elevated process may run under another account, so its config is
/// optional and its log goes to the shared flag directory.
pub async fn run_elevated_child(invocation: ChildInvocation) -> i32 {
    let config = find_remotehand_home()
        .ok()
        .and_then(|home| Config::load(&home).ok());
    let flag_dir = config
        .as_ref()
        .and_then(|config| config.elevation.flag_dir.clone())
        .unwrap_or_else(default_flag_dir);
    let configure_args = config
        .map(|config| config.remote_tool.configure_args)
        .unwrap_or_else(default_configure_args);

    let _log_guard = match init_logging(&flag_dir, ELEVATED_LOG_FILE_NAME, false) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("elevated log unavailable: {err:#}");
            None
        }
    };

    PrivilegedActionRunner::new(flag_dir, configure_args)
        .run(&invocation)
        .await
        .code()
}
