use dirs::home_dir;
use std::io::ErrorKind;
use std::path::PathBuf;

const HOME_ENV_VAR: &str = "REMOTEHAND_HOME";
const DEFAULT_DIR_NAME: &str = ".remotehand";

/// Returns the per-user state directory of the helper. It holds
/// `config.toml`, the `log/` directory and the single-instance lock.
///
/// - If `REMOTEHAND_HOME` is set, the value must exist and be a directory.
///   The value is canonicalized and this function errors otherwise.
/// - If `REMOTEHAND_HOME` is not set, the default `~/.remotehand` is returned
///   without checking that it exists. Use [`ensure_remotehand_home`] to create
///   it.
pub fn find_remotehand_home() -> std::io::Result<PathBuf> {
    let home_env = std::env::var(HOME_ENV_VAR)
        .ok()
        .filter(|val| !val.is_empty());
    find_remotehand_home_from_env(home_env.as_deref())
}

/// Like [`find_remotehand_home`], but creates the default directory when it
/// does not exist yet.
pub fn ensure_remotehand_home() -> std::io::Result<PathBuf> {
    let home = find_remotehand_home()?;
    std::fs::create_dir_all(&home)?;
    Ok(home)
}

fn find_remotehand_home_from_env(home_env: Option<&str>) -> std::io::Result<PathBuf> {
    let Some(val) = home_env else {
        let mut p = home_dir()
            .ok_or_else(|| std::io::Error::new(ErrorKind::NotFound, "could not find home directory"))?;
        p.push(DEFAULT_DIR_NAME);
        return Ok(p);
    };

    let path = PathBuf::from(val);
    let metadata = std::fs::metadata(&path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => std::io::Error::new(
            ErrorKind::NotFound,
            format!("{HOME_ENV_VAR} points to {val:?}, but that path does not exist"),
        ),
        _ => std::io::Error::new(
            err.kind(),
            format!("failed to read {HOME_ENV_VAR} {val:?}: {err}"),
        ),
    })?;
    if !metadata.is_dir() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("{HOME_ENV_VAR} points to {val:?}, but that path is not a directory"),
        ));
    }
    path.canonicalize().map_err(|err| {
        std::io::Error::new(
            err.kind(),
            format!("failed to canonicalize {HOME_ENV_VAR} {val:?}: {err}"),
        )
    })
}
