use std::path::Path;
use std::process::Command;
use std::process::Stdio;

/// Starts the replacement script so that it outlives this process.
pub trait DetachedLauncher: Send + Sync {
    fn launch(&self, script: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDetachedLauncher;

impl DetachedLauncher for SystemDetachedLauncher {
    fn launch(&self, script: &Path) -> std::io::Result<()> {
        let mut command = detached_command(script);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = command.spawn()?;
        tracing::info!(
            "started replacement script {} (pid {})",
            script.display(),
            child.id()
        );
        Ok(())
    }
}

#[cfg(windows)]
fn detached_command(script: &Path) -> Command {
    use std::os::windows::process::CommandExt;

    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut command = Command::new("cmd");
    command
        .arg("/C")
        .arg(script)
        .creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    command
}

#[cfg(unix)]
fn detached_command(script: &Path) -> Command {
    use std::os::unix::process::CommandExt;

    // Own process group, so terminating this process does not take the
    // script down with it.
    let mut command = Command::new("sh");
    command.arg(script).process_group(0);
    command
}
