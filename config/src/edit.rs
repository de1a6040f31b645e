use crate::CONFIG_TOML_FILE;
use crate::ConfigError;
use crate::Identity;
use crate::load_config_toml;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Persists the store/location/user recorded by `setup`, keeping every other
/// table of `config.toml` intact.
pub fn write_identity(home: &Path, identity: &Identity) -> Result<(), ConfigError> {
    let mut cfg = load_config_toml(home)?;
    cfg.store = identity.store.clone();
    cfg.location = identity.location.clone();
    cfg.user_name = identity.user_name.clone();

    let contents = toml::to_string_pretty(&cfg)?;
    let path = home.join(CONFIG_TOML_FILE);
    std::fs::create_dir_all(home).map_err(|source| ConfigError::Io {
        action: "creating",
        path: home.to_path_buf(),
        source,
    })?;
    let io_err = |action: &'static str| {
        let path = path.clone();
        move |source| ConfigError::Io {
            action,
            path,
            source,
        }
    };
    let mut tmp = NamedTempFile::new_in(home).map_err(io_err("creating temp file for"))?;
    tmp.write_all(contents.as_bytes())
        .map_err(io_err("writing"))?;
    tmp.persist(&path)
        .map_err(|err| err.error)
        .map_err(io_err("replacing"))?;
    tracing::info!("recorded identity {} in {}", identity.label(), path.display());
    Ok(())
}
