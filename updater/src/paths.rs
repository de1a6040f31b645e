use crate::UpdateError;
use std::path::Path;
use std::path::PathBuf;

pub const STATUS_FILE_NAME: &str = "remotehand-update.status";
pub const UPDATE_LOG_FILE_NAME: &str = "remotehand-update.log";

#[cfg(windows)]
pub const SCRIPT_FILE_NAME: &str = "remotehand-update.cmd";
#[cfg(not(windows))]
pub const SCRIPT_FILE_NAME: &str = "remotehand-update.sh";

/// Every file the swap touches. All of them sit in the install directory so
/// the swap is a rename within one filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePaths {
    pub install: PathBuf,
    pub candidate: PathBuf,
    pub backup: PathBuf,
    pub status: PathBuf,
    pub log: PathBuf,
    pub script: PathBuf,
}

impl UpdatePaths {
    pub fn for_install(install: &Path) -> Result<Self, UpdateError> {
        let invalid = || UpdateError::InvalidInstallPath {
            path: install.to_path_buf(),
        };
        let dir = install.parent().ok_or_else(invalid)?;
        let stem = install.file_stem().ok_or_else(invalid)?.to_string_lossy();
        Ok(Self {
            install: install.to_path_buf(),
            candidate: dir.join(format!("{stem}.update")),
            backup: dir.join(format!("{stem}.backup")),
            status: dir.join(STATUS_FILE_NAME),
            log: dir.join(UPDATE_LOG_FILE_NAME),
            script: dir.join(SCRIPT_FILE_NAME),
        })
    }

    pub fn install_dir(&self) -> &Path {
        self.install.parent().unwrap_or_else(|| Path::new("."))
    }

    /// File name of the installed image, used to scope process termination.
    pub fn image_name(&self) -> String {
        self.install
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derived_paths_are_siblings_of_install() {
        let paths = UpdatePaths::for_install(Path::new("/opt/remotehand/RemoteHand.exe"))
            .expect("paths");
        assert_eq!(
            paths.candidate,
            PathBuf::from("/opt/remotehand/RemoteHand.update")
        );
        assert_eq!(
            paths.backup,
            PathBuf::from("/opt/remotehand/RemoteHand.backup")
        );
        assert_eq!(paths.install_dir(), Path::new("/opt/remotehand"));
        assert_eq!(paths.image_name(), "RemoteHand.exe");
        assert_ne!(paths.candidate, paths.install);
    }

    #[test]
    fn extensionless_install_still_gets_distinct_candidate() {
        let paths = UpdatePaths::for_install(Path::new("/usr/local/bin/remotehand"))
            .expect("paths");
        assert_eq!(
            paths.candidate,
            PathBuf::from("/usr/local/bin/remotehand.update")
        );
    }

    #[test]
    fn root_is_not_an_install_path() {
        assert!(UpdatePaths::for_install(Path::new("/")).is_err());
    }
}
