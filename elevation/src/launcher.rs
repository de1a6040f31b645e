use crate::ActionRequest;
use crate::ElevatedInvocation;
use crate::ElevationError;
use crate::Elevator;
use crate::RequestLock;
use crate::flag::CompletionReport;
use crate::flag::FlagContents;
use crate::flag::clear_flag;
use crate::flag::read_flag;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct LauncherOptions {
    pub flag_dir: PathBuf,
    /// Image re-invoked elevated, normally the running executable.
    pub helper: PathBuf,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Result of a privileged request as far as the parent can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed(CompletionReport),
    /// A flag appeared but its content was unreadable.
    CompletedUnreadable,
    /// No flag within the timeout. The child may still finish later, so this
    /// is neither success nor failure.
    Unconfirmed { waited: Duration },
}

impl ActionOutcome {
    /// Short description suitable for operator output and chat reports.
    pub fn best_known_state(&self) -> &'static str {
        match self {
            Self::Completed(report) if report.succeeded => "applied",
            Self::Completed(report) if report.attempted => "failed",
            Self::Completed(_) => "not attempted",
            Self::CompletedUnreadable => "completed, outcome unknown",
            Self::Unconfirmed { .. } => "unconfirmed",
        }
    }

    pub fn is_confirmed_success(&self) -> bool {
        matches!(self, Self::Completed(report) if report.succeeded)
    }
}

pub struct ElevatedActionLauncher {
    options: LauncherOptions,
    elevator: Arc<dyn Elevator>,
}

impl ElevatedActionLauncher {
    pub fn new(options: LauncherOptions, elevator: Arc<dyn Elevator>) -> Self {
        Self { options, elevator }
    }

    pub fn options(&self) -> &LauncherOptions {
        &self.options
    }

    /// Clears any stale flag, starts the elevated child and waits for its
    /// completion flag, bounded by the configured timeout.
    pub async fn request_privileged_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionOutcome, ElevationError> {
        let flag_dir = &self.options.flag_dir;
        std::fs::create_dir_all(flag_dir).map_err(ElevationError::io("creating", flag_dir))?;
        let mut lock = RequestLock::open(flag_dir)?;
        let _guard = lock.try_acquire()?;

        match clear_flag(flag_dir) {
            Ok(true) => tracing::info!("removed stale completion flag before launch"),
            Ok(false) => {}
            Err(err) => tracing::warn!("could not remove stale completion flag: {err}"),
        }

        let invocation = ElevatedInvocation::set_credential(
            self.options.helper.clone(),
            request.target(),
            request.request_id,
        );
        tracing::info!(
            request_id = %request.request_id,
            target = %request.target().display(),
            "requesting elevated credential set"
        );
        self.elevator.launch(&invocation, &request.secret_payload)?;

        let outcome = self.wait_for_flag(request.request_id).await;
        match &outcome {
            ActionOutcome::Unconfirmed { waited } => tracing::warn!(
                request_id = %request.request_id,
                "no completion flag after {}s; outcome unconfirmed",
                waited.as_secs()
            ),
            other => tracing::info!(
                request_id = %request.request_id,
                "privileged action finished: {}",
                other.best_known_state()
            ),
        }
        Ok(outcome)
    }

    async fn wait_for_flag(&self, request_id: uuid::Uuid) -> ActionOutcome {
        let started = Instant::now();
        loop {
            if let Some(outcome) = self.observe_flag(request_id) {
                return outcome;
            }
            let waited = started.elapsed();
            if waited >= self.options.timeout {
                return ActionOutcome::Unconfirmed { waited };
            }
            let remaining = self.options.timeout - waited;
            tokio::time::sleep(self.options.poll_interval.min(remaining)).await;
        }
    }

    /// Reads and consumes the flag if present. A report for another request
    /// is discarded and polling continues.
    fn observe_flag(&self, request_id: uuid::Uuid) -> Option<ActionOutcome> {
        let flag_dir = &self.options.flag_dir;
        let contents = match read_flag(flag_dir) {
            Ok(contents) => contents?,
            // The child finished but left a flag this user cannot open.
            Err(ElevationError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                tracing::warn!("completion flag exists but is not readable: {source}");
                FlagContents::Unreadable
            }
            Err(err) => {
                tracing::warn!("failed to read completion flag: {err}");
                return None;
            }
        };
        if let Err(err) = clear_flag(flag_dir) {
            tracing::warn!("failed to consume completion flag: {err}");
        }
        match contents {
            FlagContents::Report(report) if report.request_id != request_id => {
                tracing::warn!(
                    "discarding completion flag for request {} while waiting for {request_id}",
                    report.request_id
                );
                None
            }
            FlagContents::Report(report) => Some(ActionOutcome::Completed(report)),
            FlagContents::Unreadable => Some(ActionOutcome::CompletedUnreadable),
        }
    }
}
