use crate::Credential;
use crate::ElevationError;
use chrono::DateTime;
use chrono::Utc;
use std::path::Path;
use std::path::PathBuf;
use uuid::Uuid;

/// A single request to apply `secret_payload` to the tool at
/// `target_executable_path` from an elevated child.
#[derive(Debug)]
pub struct ActionRequest {
    pub target_executable_path: PathBuf,
    pub secret_payload: Credential,
    pub requested_at: DateTime<Utc>,
    /// Echoed back in the completion flag so a leftover flag from an earlier
    /// request is never mistaken for this one.
    pub request_id: Uuid,
}

impl ActionRequest {
    pub fn new(target: impl Into<PathBuf>, secret: Credential) -> Result<Self, ElevationError> {
        let target_executable_path = target.into();
        if !target_executable_path.exists() {
            return Err(ElevationError::TargetMissing {
                path: target_executable_path,
            });
        }
        Ok(Self {
            target_executable_path,
            secret_payload: secret,
            requested_at: Utc::now(),
            request_id: Uuid::new_v4(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target_executable_path
    }
}
