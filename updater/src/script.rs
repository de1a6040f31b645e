//! The external script that swaps the executable once this process is gone.
//!
//! Order of operations, identical on both platforms:
//! 1. ask the recorded process to exit, then force it (matched by PID, and by
//!    image name on Windows); a process that already exited is fine
//! 2. wait the settle time so the OS releases the image
//! 3. copy install -> backup (on failure: `backup-failed`, exit 1)
//! 4. move candidate -> install (on failure: backup -> install,
//!    `rolled-back`, exit 1)
//! 5. delete the backup, write `succeeded`, relaunch, delete the script
//!
//! From step 3 on, either the backup or a working install exists.

use crate::UpdateError;
use crate::paths::UpdatePaths;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);
pub const DEFAULT_GRACEFUL_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementScript {
    pub paths: UpdatePaths,
    pub pid: u32,
    pub image_name: String,
    pub settle: Duration,
    /// How long the graceful termination request is given before forcing.
    pub graceful_wait: Duration,
}

impl ReplacementScript {
    pub fn new(paths: UpdatePaths, pid: u32, settle: Duration) -> Self {
        let image_name = paths.image_name();
        Self {
            paths,
            pid,
            image_name,
            settle,
            graceful_wait: DEFAULT_GRACEFUL_WAIT,
        }
    }

    /// Script body for the current platform.
    pub fn render(&self) -> String {
        if cfg!(windows) {
            self.render_cmd()
        } else {
            self.render_sh()
        }
    }

    /// Writes the script to [`UpdatePaths::script`] and returns that path.
    pub fn write(&self) -> Result<PathBuf, UpdateError> {
        let path = self.paths.script.clone();
        std::fs::write(&path, self.render()).map_err(UpdateError::io("writing", &path))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
                .map_err(UpdateError::io("marking executable", &path))?;
        }
        Ok(path)
    }

    pub fn render_sh(&self) -> String {
        let p = &self.paths;
        format!(
            r#"#!/bin/sh
# remotehand self-update; deletes itself after a successful swap
PID={pid}
INSTALL={install}
CANDIDATE={candidate}
BACKUP={backup}
STATUS={status}
LOG={log}
SCRIPT={script}

log() {{
    printf '%s %s\n' "$(date '+%Y-%m-%d %H:%M:%S')" "$1" >> "$LOG" 2>/dev/null
}}

log "stopping process $PID"
if kill -0 "$PID" 2>/dev/null; then
    kill -TERM "$PID" 2>/dev/null
    waited=0
    while kill -0 "$PID" 2>/dev/null && [ "$waited" -lt {graceful} ]; do
        sleep 1
        waited=$((waited + 1))
    done
    if kill -0 "$PID" 2>/dev/null; then
        log "process $PID ignored TERM; killing"
        kill -KILL "$PID" 2>/dev/null
    fi
fi

sleep {settle}

if ! cp -p "$INSTALL" "$BACKUP"; then
    log "backup of $INSTALL failed; install left untouched"
    printf 'backup-failed\n' > "$STATUS"
    exit 1
fi

if ! mv -f "$CANDIDATE" "$INSTALL"; then
    log "swap failed; restoring backup"
    mv -f "$BACKUP" "$INSTALL"
    printf 'rolled-back\n' > "$STATUS"
    exit 1
fi

rm -f "$BACKUP"
printf 'succeeded\n' > "$STATUS"
log "swap succeeded; relaunching $INSTALL"
nohup "$INSTALL" >/dev/null 2>&1 &
rm -f "$SCRIPT"
exit 0
"#,
            pid = self.pid,
            install = sh_quote(&p.install),
            candidate = sh_quote(&p.candidate),
            backup = sh_quote(&p.backup),
            status = sh_quote(&p.status),
            log = sh_quote(&p.log),
            script = sh_quote(&p.script),
            graceful = self.graceful_wait.as_secs(),
            settle = self.settle.as_secs(),
        )
    }

    pub fn render_cmd(&self) -> String {
        let p = &self.paths;
        // `ping -n N` waits N-1 seconds and, unlike `timeout`, works without
        // a console.
        let lines = [
            "@echo off".to_string(),
            "setlocal".to_string(),
            format!("set \"PID={}\"", self.pid),
            format!("set \"IMAGE={}\"", cmd_escape(&self.image_name)),
            format!("set \"INSTALL={}\"", cmd_escape_path(&p.install)),
            format!("set \"CANDIDATE={}\"", cmd_escape_path(&p.candidate)),
            format!("set \"BACKUP={}\"", cmd_escape_path(&p.backup)),
            format!("set \"STATUS={}\"", cmd_escape_path(&p.status)),
            format!("set \"LOG={}\"", cmd_escape_path(&p.log)),
            String::new(),
            "call :log \"stopping %IMAGE% (pid %PID%)\"".to_string(),
            "taskkill /PID %PID% /FI \"IMAGENAME eq %IMAGE%\" >nul 2>&1".to_string(),
            format!(
                "ping -n {} 127.0.0.1 >nul",
                self.graceful_wait.as_secs() + 1
            ),
            "taskkill /F /PID %PID% /FI \"IMAGENAME eq %IMAGE%\" >nul 2>&1".to_string(),
            format!("ping -n {} 127.0.0.1 >nul", self.settle.as_secs() + 1),
            String::new(),
            "copy /Y \"%INSTALL%\" \"%BACKUP%\" >nul".to_string(),
            "if errorlevel 1 goto backup_failed".to_string(),
            "move /Y \"%CANDIDATE%\" \"%INSTALL%\" >nul".to_string(),
            "if errorlevel 1 goto rollback".to_string(),
            String::new(),
            "del /F /Q \"%BACKUP%\" >nul 2>&1".to_string(),
            ">\"%STATUS%\" echo succeeded".to_string(),
            "call :log \"swap succeeded; relaunching\"".to_string(),
            "start \"\" \"%INSTALL%\"".to_string(),
            "(goto) 2>nul & del /F /Q \"%~f0\"".to_string(),
            String::new(),
            ":backup_failed".to_string(),
            "call :log \"backup failed; install left untouched\"".to_string(),
            ">\"%STATUS%\" echo backup-failed".to_string(),
            "exit /b 1".to_string(),
            String::new(),
            ":rollback".to_string(),
            "call :log \"swap failed; restoring backup\"".to_string(),
            "move /Y \"%BACKUP%\" \"%INSTALL%\" >nul".to_string(),
            ">\"%STATUS%\" echo rolled-back".to_string(),
            "exit /b 1".to_string(),
            String::new(),
            ":log".to_string(),
            ">>\"%LOG%\" echo %date% %time% %~1".to_string(),
            "exit /b 0".to_string(),
        ];
        let mut script = lines.join("\r\n");
        script.push_str("\r\n");
        script
    }
}

fn sh_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn cmd_escape(value: &str) -> String {
    value.replace('%', "%%")
}

fn cmd_escape_path(path: &Path) -> String {
    cmd_escape(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn script(install: &str) -> ReplacementScript {
        ReplacementScript::new(
            UpdatePaths::for_install(Path::new(install)).expect("paths"),
            4242,
            DEFAULT_SETTLE,
        )
    }

    #[test]
    fn sh_script_embeds_quoted_paths_and_pid() {
        let body = script("/opt/it's here/remotehand").render_sh();
        assert!(body.starts_with("#!/bin/sh\n"));
        assert!(body.contains("PID=4242\n"));
        assert!(body.contains(r"INSTALL='/opt/it'\''s here/remotehand'"));
        assert!(body.contains(r"BACKUP='/opt/it'\''s here/remotehand.backup'"));
        assert!(body.contains("sleep 2\n"));
    }

    #[test]
    fn sh_script_terminates_gracefully_before_forcing() {
        let body = script("/opt/remotehand/remotehand").render_sh();
        let term = body.find("kill -TERM").expect("graceful");
        let kill = body.find("kill -KILL").expect("forced");
        let backup = body.find("cp -p").expect("backup");
        let swap = body.find("mv -f \"$CANDIDATE\"").expect("swap");
        assert!(term < kill && kill < backup && backup < swap);
    }

    #[test]
    fn cmd_script_scopes_taskkill_by_pid_and_image() {
        let mut script = script(r"C:\Program Files\RemoteHand\RemoteHand.exe");
        // Windows separators are not path separators on every host.
        script.image_name = "RemoteHand.exe".to_string();
        let body = script.render_cmd();
        assert!(body.contains("set \"PID=4242\"\r\n"));
        assert!(body.contains("set \"IMAGE=RemoteHand.exe\"\r\n"));
        assert!(body.contains("taskkill /PID %PID% /FI \"IMAGENAME eq %IMAGE%\""));
        assert!(body.contains("taskkill /F /PID %PID% /FI \"IMAGENAME eq %IMAGE%\""));
        assert!(!body.contains("/IM "), "must not kill every instance by name");
    }

    #[test]
    fn cmd_script_escapes_percent_signs() {
        assert_eq!(cmd_escape(r"C:\100%\RemoteHand.exe"), r"C:\100%%\RemoteHand.exe");
    }

    #[test]
    fn cmd_script_rolls_back_on_failed_move() {
        let body = script(r"C:\RemoteHand\RemoteHand.exe").render_cmd();
        let rollback = body.find(":rollback").expect("rollback label");
        assert!(body[rollback..].contains("move /Y \"%BACKUP%\" \"%INSTALL%\""));
        assert!(body[rollback..].contains("echo rolled-back"));
    }
}
