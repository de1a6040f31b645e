//! Re-invoking the helper image with elevated rights.

use crate::CREDENTIAL_ENV_VAR;
use crate::Credential;
use crate::ElevationError;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use uuid::Uuid;

pub const SET_CREDENTIAL_ARG: &str = "--set-credential";
pub const REQUEST_ID_ARG: &str = "--request-id";

#[cfg(unix)]
const HOME_ENV_VAR: &str = "REMOTEHAND_HOME";

/// Image plus argv for the privileged child. The secret is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatedInvocation {
    pub helper: PathBuf,
    pub args: Vec<OsString>,
}

impl ElevatedInvocation {
    pub fn set_credential(helper: PathBuf, target: &std::path::Path, request_id: Uuid) -> Self {
        Self {
            helper,
            args: vec![
                SET_CREDENTIAL_ARG.into(),
                target.as_os_str().to_os_string(),
                REQUEST_ID_ARG.into(),
                request_id.to_string().into(),
            ],
        }
    }
}

/// Starts the elevated child and returns without waiting for it. Consent
/// prompts are owned by the OS; denial is only ever observed as a missing
/// completion flag.
pub trait Elevator: Send + Sync {
    fn launch(
        &self,
        invocation: &ElevatedInvocation,
        credential: &Credential,
    ) -> Result<(), ElevationError>;
}

/// Platform elevation: `Start-Process -Verb RunAs` on Windows, `sudo`
/// elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemElevator;

impl Elevator for SystemElevator {
    fn launch(
        &self,
        invocation: &ElevatedInvocation,
        credential: &Credential,
    ) -> Result<(), ElevationError> {
        let mut command = elevation_command(invocation, credential)?;
        command
            .env(CREDENTIAL_ENV_VAR, credential.expose_secret())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = command.spawn().map_err(|source| ElevationError::Launch {
            helper: invocation.helper.clone(),
            source,
        })?;
        tracing::info!(
            "launched elevation helper {} (pid {})",
            invocation.helper.display(),
            child.id()
        );
        reap_in_background(child);
        Ok(())
    }
}

fn reap_in_background(mut child: Child) {
    std::thread::spawn(move || match child.wait() {
        Ok(status) => tracing::debug!("elevation helper exited with {status}"),
        Err(err) => tracing::debug!("failed to wait for elevation helper: {err}"),
    });
}

#[cfg(windows)]
fn elevation_command(
    invocation: &ElevatedInvocation,
    credential: &Credential,
) -> Result<Command, ElevationError> {
    use std::os::windows::process::CommandExt;

    // The elevated child does not inherit our environment.
    let pipe = crate::handoff::serve_credential(credential, crate::DEFAULT_TIMEOUT)?;
    let mut invocation = invocation.clone();
    invocation
        .args
        .extend([crate::CREDENTIAL_PIPE_ARG.into(), pipe.into()]);
    let script = start_process_script(&invocation);
    let mut command = Command::new("powershell.exe");
    command
        .args(["-NoProfile", "-NonInteractive", "-WindowStyle", "Hidden", "-Command"])
        .arg(script)
        .stdin(Stdio::null())
        .creation_flags(0x08000000); // CREATE_NO_WINDOW
    Ok(command)
}

#[cfg(unix)]
fn elevation_command(
    invocation: &ElevatedInvocation,
    _credential: &Credential,
) -> Result<Command, ElevationError> {
    let command = if crate::is_elevated()? {
        let mut command = Command::new(&invocation.helper);
        command.args(&invocation.args);
        command
    } else {
        // Keep the home override so the child reads the same config.
        let mut command = Command::new("sudo");
        command
            .arg(format!("--preserve-env={CREDENTIAL_ENV_VAR},{HOME_ENV_VAR}"))
            .arg("--")
            .arg(&invocation.helper)
            .args(&invocation.args);
        command
    };
    Ok(command)
}

/// PowerShell snippet that asks the OS to start the helper elevated. The
/// helper inherits the environment of the PowerShell process, which in turn
/// is the only process that carries the credential.
#[cfg_attr(not(windows), allow(dead_code))]
fn start_process_script(invocation: &ElevatedInvocation) -> String {
    let argument_list = invocation
        .args
        .iter()
        .map(|arg| quote_arg(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Start-Process -FilePath {} -ArgumentList {} -Verb RunAs -WindowStyle Hidden",
        powershell_literal(&invocation.helper.to_string_lossy()),
        powershell_literal(&argument_list),
    )
}

#[cfg_attr(not(windows), allow(dead_code))]
fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quotes one argument using the MSVC command-line rules.
#[cfg_attr(not(windows), allow(dead_code))]
fn quote_arg(arg: &str) -> String {
    let needs = arg.is_empty()
        || arg
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '"'));
    if !needs {
        return arg.to_string();
    }
    let mut out = String::from("\"");
    let mut backslashes = 0;
    for ch in arg.chars() {
        match ch {
            '\\' => backslashes += 1,
            '"' => {
                out.push_str(&"\\".repeat(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.push_str(&"\\".repeat(backslashes));
                backslashes = 0;
                out.push(ch);
            }
        }
    }
    out.push_str(&"\\".repeat(backslashes * 2));
    out.push('"');
    out
}
