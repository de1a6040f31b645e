//! The elevated side of the credential handshake.

use crate::Credential;
use crate::ElevationError;
use crate::flag::CompletionReport;
use crate::flag::write_flag;
use crate::handoff::receive_credential;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

pub const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(10);

/// AnyDesk answers `--set-password` with 8000 once the password is stored.
const TOOL_APPLIED_EXIT_CODE: i32 = 8000;

pub fn default_configure_args() -> Vec<String> {
    vec!["--set-password".to_string(), "_full_access".to_string()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Success,
    ConfigureFailed,
    NotElevated,
    TargetMissing,
    CredentialMissing,
    FlagWriteFailed,
}

impl ChildExit {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::ConfigureFailed => 2,
            Self::NotElevated => 3,
            Self::TargetMissing => 4,
            Self::CredentialMissing => 5,
            Self::FlagWriteFailed => 6,
        }
    }
}

/// Parsed `--set-credential <path> --request-id <uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInvocation {
    pub target: PathBuf,
    pub request_id: Uuid,
    /// Named pipe to read the secret from when the environment lacks it.
    pub credential_pipe: Option<String>,
}

pub fn is_configure_success(code: i32) -> bool {
    code == 0 || code == TOOL_APPLIED_EXIT_CODE
}

type ElevationCheck = Box<dyn Fn() -> Result<bool, ElevationError> + Send + Sync>;

pub struct PrivilegedActionRunner {
    flag_dir: PathBuf,
    configure_args: Vec<String>,
    configure_timeout: Duration,
    elevation_check: ElevationCheck,
}

impl PrivilegedActionRunner {
    pub fn new(flag_dir: PathBuf, configure_args: Vec<String>) -> Self {
        Self {
            flag_dir,
            configure_args,
            configure_timeout: CONFIGURE_TIMEOUT,
            elevation_check: Box::new(crate::is_elevated),
        }
    }

    pub fn with_elevation_check(
        mut self,
        check: impl Fn() -> Result<bool, ElevationError> + Send + Sync + 'static,
    ) -> Self {
        self.elevation_check = Box::new(check);
        self
    }

    pub fn with_configure_timeout(mut self, timeout: Duration) -> Self {
        self.configure_timeout = timeout;
        self
    }

    /// Runs the action with the credential taken from the environment, or
    /// from the parent's pipe when the environment did not survive elevation.
    pub async fn run(&self, invocation: &ChildInvocation) -> ChildExit {
        let credential = match (Credential::from_env(), &invocation.credential_pipe) {
            (Err(_), Some(pipe)) => receive_credential(pipe).await,
            (credential, _) => credential,
        };
        self.run_with_credential(invocation, credential).await
    }

    pub async fn run_with_credential(
        &self,
        invocation: &ChildInvocation,
        credential: Result<Credential, ElevationError>,
    ) -> ChildExit {
        tracing::info!(
            request_id = %invocation.request_id,
            target = %invocation.target.display(),
            "elevated credential set starting"
        );

        match (self.elevation_check)() {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("refusing to run: process is not elevated");
                return ChildExit::NotElevated;
            }
            Err(err) => {
                tracing::error!("refusing to run: {err}");
                return ChildExit::NotElevated;
            }
        }

        if !invocation.target.exists() {
            let detail = format!("target {} does not exist", invocation.target.display());
            tracing::error!("{detail}");
            let report = CompletionReport::not_attempted(invocation.request_id, detail);
            return self.finish(&report, ChildExit::TargetMissing);
        }

        let credential = match credential {
            Ok(credential) => credential,
            Err(err) => {
                tracing::error!("{err}");
                let report = CompletionReport::not_attempted(
                    invocation.request_id,
                    "credential missing from environment",
                );
                return self.finish(&report, ChildExit::CredentialMissing);
            }
        };

        let report = match self.configure(invocation, &credential).await {
            Ok(code) if is_configure_success(code) => {
                tracing::info!("remote tool accepted the credential (exit code {code})");
                CompletionReport::attempted(invocation.request_id, true, Some(code), "applied")
            }
            Ok(code) => {
                tracing::warn!("remote tool rejected the credential (exit code {code})");
                CompletionReport::attempted(
                    invocation.request_id,
                    false,
                    Some(code),
                    format!("tool exited with {code}"),
                )
            }
            Err(detail) => {
                tracing::warn!("credential set failed: {detail}");
                CompletionReport::attempted(invocation.request_id, false, None, detail)
            }
        };
        let exit = if report.succeeded {
            ChildExit::Success
        } else {
            ChildExit::ConfigureFailed
        };
        self.finish(&report, exit)
    }

    /// Writes the completion flag. Always the last step of a run.
    fn finish(&self, report: &CompletionReport, exit: ChildExit) -> ChildExit {
        match write_flag(&self.flag_dir, report) {
            Ok(()) => exit,
            Err(err) => {
                tracing::error!("failed to write completion flag: {err}");
                ChildExit::FlagWriteFailed
            }
        }
    }

    async fn configure(
        &self,
        invocation: &ChildInvocation,
        credential: &Credential,
    ) -> Result<i32, String> {
        let mut child = Command::new(&invocation.target)
            .args(&self.configure_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| format!("failed to start {}: {err}", invocation.target.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = zeroize::Zeroizing::new(format!("{}\n", credential.expose_secret()));
            if let Err(err) = stdin.write_all(payload.as_bytes()).await {
                tracing::warn!("failed to write credential to tool stdin: {err}");
            }
        }

        match tokio::time::timeout(self.configure_timeout, child.wait()).await {
            Ok(Ok(status)) => status
                .code()
                .ok_or_else(|| "tool was terminated by a signal".to_string()),
            Ok(Err(err)) => Err(format!("failed to wait for tool: {err}")),
            Err(_) => {
                if let Err(err) = child.kill().await {
                    tracing::warn!("failed to kill timed-out tool: {err}");
                }
                Err(format!(
                    "tool did not finish within {}s",
                    self.configure_timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FlagContents;
    use crate::flag::flag_path;
    use crate::flag::read_flag;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn runner(flag_dir: &TempDir, elevated: bool) -> PrivilegedActionRunner {
        PrivilegedActionRunner::new(flag_dir.path().to_path_buf(), default_configure_args())
            .with_elevation_check(move || Ok(elevated))
    }

    fn report(flag_dir: &TempDir) -> CompletionReport {
        match read_flag(flag_dir.path()).expect("read flag") {
            Some(FlagContents::Report(report)) => report,
            other => panic!("expected a report, got {other:?}"),
        }
    }

    #[cfg(unix)]
    fn fake_tool(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-tool.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod tool");
        path
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ChildExit::Success.code(), 0);
        assert_eq!(ChildExit::ConfigureFailed.code(), 2);
        assert_eq!(ChildExit::NotElevated.code(), 3);
        assert_eq!(ChildExit::TargetMissing.code(), 4);
        assert_eq!(ChildExit::CredentialMissing.code(), 5);
        assert_eq!(ChildExit::FlagWriteFailed.code(), 6);
    }

    #[test]
    fn tool_applied_code_counts_as_success() {
        assert!(is_configure_success(0));
        assert!(is_configure_success(8000));
        assert!(!is_configure_success(1));
    }

    #[tokio::test]
    async fn unelevated_run_leaves_flag_alone() {
        let flag_dir = TempDir::new().expect("tempdir");
        let invocation = ChildInvocation {
            target: PathBuf::from("/bin/sh"),
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, false)
            .run_with_credential(&invocation, Credential::new("pw"))
            .await;

        assert_eq!(exit, ChildExit::NotElevated);
        assert!(!flag_path(flag_dir.path()).exists());
    }

    #[tokio::test]
    async fn missing_target_records_not_attempted() {
        let flag_dir = TempDir::new().expect("tempdir");
        let invocation = ChildInvocation {
            target: flag_dir.path().join("missing.exe"),
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, true)
            .run_with_credential(&invocation, Credential::new("pw"))
            .await;

        assert_eq!(exit, ChildExit::TargetMissing);
        let report = report(&flag_dir);
        assert_eq!(report.request_id, invocation.request_id);
        assert!(!report.attempted);
        assert!(!report.succeeded);
    }

    #[tokio::test]
    async fn missing_credential_fails_closed() {
        let flag_dir = TempDir::new().expect("tempdir");
        let target = tempfile::NamedTempFile::new().expect("target");
        let invocation = ChildInvocation {
            target: target.path().to_path_buf(),
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, true)
            .run_with_credential(&invocation, Err(ElevationError::CredentialMissing))
            .await;

        assert_eq!(exit, ChildExit::CredentialMissing);
        assert!(!report(&flag_dir).attempted);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn secret_is_written_to_tool_stdin() {
        let flag_dir = TempDir::new().expect("tempdir");
        let tools = TempDir::new().expect("tempdir");
        let captured = tools.path().join("captured");
        let tool = fake_tool(
            &tools,
            &format!(
                "[ \"$1\" = --set-password ] || exit 9\nread pw\nprintf '%s' \"$pw\" > '{}'\nexit 0",
                captured.display()
            ),
        );
        let invocation = ChildInvocation {
            target: tool,
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, true)
            .run_with_credential(&invocation, Credential::new("Xy12secret"))
            .await;

        assert_eq!(exit, ChildExit::Success);
        assert_eq!(
            std::fs::read_to_string(&captured).expect("captured"),
            "Xy12secret"
        );
        let report = report(&flag_dir);
        assert!(report.attempted);
        assert!(report.succeeded);
        assert_eq!(report.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_tool_still_writes_flag() {
        let flag_dir = TempDir::new().expect("tempdir");
        let tools = TempDir::new().expect("tempdir");
        let tool = fake_tool(&tools, "exit 7");
        let invocation = ChildInvocation {
            target: tool,
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, true)
            .run_with_credential(&invocation, Credential::new("pw"))
            .await;

        assert_eq!(exit, ChildExit::ConfigureFailed);
        let report = report(&flag_dir);
        assert!(report.attempted);
        assert!(!report.succeeded);
        assert_eq!(report.exit_code, Some(7));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_is_killed_after_timeout() {
        let flag_dir = TempDir::new().expect("tempdir");
        let tools = TempDir::new().expect("tempdir");
        let tool = fake_tool(&tools, "exec sleep 30");
        let invocation = ChildInvocation {
            target: tool,
            request_id: Uuid::new_v4(),
            credential_pipe: None,
        };

        let exit = runner(&flag_dir, true)
            .with_configure_timeout(Duration::from_millis(200))
            .run_with_credential(&invocation, Credential::new("pw"))
            .await;

        assert_eq!(exit, ChildExit::ConfigureFailed);
        let report = report(&flag_dir);
        assert!(report.attempted);
        assert_eq!(report.exit_code, None);
        assert!(report.detail.contains("did not finish"), "{}", report.detail);
    }
}
