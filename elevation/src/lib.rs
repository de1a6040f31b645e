//! Elevated credential handshake for the remote-access tool.
//!
//! The interactive process builds an [`ActionRequest`], re-invokes itself
//! elevated through an [`Elevator`], then polls a shared directory for the
//! completion flag the elevated child writes when it is done. The child side
//! lives in [`PrivilegedActionRunner`].

mod child;
mod credential;
mod elevator;
mod error;
pub mod flag;
mod handoff;
mod launcher;
mod lock;
mod platform;
mod request;

pub use child::CONFIGURE_TIMEOUT;
pub use child::ChildExit;
pub use child::ChildInvocation;
pub use child::PrivilegedActionRunner;
pub use child::default_configure_args;
pub use child::is_configure_success;
pub use credential::CREDENTIAL_ENV_VAR;
pub use credential::Credential;
pub use elevator::ElevatedInvocation;
pub use elevator::Elevator;
pub use elevator::REQUEST_ID_ARG;
pub use elevator::SET_CREDENTIAL_ARG;
pub use elevator::SystemElevator;
pub use error::ElevationError;
pub use flag::CompletionReport;
pub use flag::ELEVATED_LOG_FILE_NAME;
pub use flag::FLAG_FILE_NAME;
pub use flag::default_flag_dir;
pub use handoff::CREDENTIAL_PIPE_ARG;
pub use handoff::receive_credential;
pub use launcher::ActionOutcome;
pub use launcher::DEFAULT_POLL_INTERVAL;
pub use launcher::DEFAULT_TIMEOUT;
pub use launcher::ElevatedActionLauncher;
pub use launcher::LauncherOptions;
pub use lock::LOCK_FILE_NAME;
pub use lock::RequestLock;
pub use platform::is_elevated;
pub use request::ActionRequest;
