//! Self-update for the RemoteHand executable.
//!
//! [`UpdateOrchestrator`] compares the local version marker with the latest
//! published release, downloads a newer build next to the running executable
//! and hands the swap to a generated [`ReplacementScript`]. The script runs
//! after this process exits and records its result for the next start
//! ([`read_previous_swap_status`]).

mod download;
mod error;
mod launch;
pub mod marker;
mod orchestrator;
mod paths;
mod release;
mod script;
mod status;
mod version;

pub use download::DownloadedFile;
pub use download::UpdatePackage;
pub use download::download_candidate;
pub use download::download_executable;
pub use error::UpdateError;
pub use launch::DetachedLauncher;
pub use launch::SystemDetachedLauncher;
pub use marker::VERSION_FILE_NAME;
pub use marker::read_local_version;
pub use orchestrator::UpdateOrchestrator;
pub use orchestrator::UpdateOutcome;
pub use orchestrator::UpdateState;
pub use orchestrator::UpdaterOptions;
pub use paths::SCRIPT_FILE_NAME;
pub use paths::STATUS_FILE_NAME;
pub use paths::UPDATE_LOG_FILE_NAME;
pub use paths::UpdatePaths;
pub use release::Release;
pub use release::ReleaseAsset;
pub use release::ReleaseClient;
pub use release::build_http_client;
pub use script::DEFAULT_GRACEFUL_WAIT;
pub use script::DEFAULT_SETTLE;
pub use script::ReplacementScript;
pub use status::SwapStatus;
pub use status::read_previous_swap_status;
pub use version::ParseVersionError;
pub use version::Version;
