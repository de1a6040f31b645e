use anyhow::Context;
use remotehand_config::CONFIG_TOML_FILE;
use remotehand_config::Identity;
use remotehand_config::write_identity;
use std::path::Path;

#[derive(Debug, clap::Args)]
pub struct SetupArgs {
    /// Store number or name shown in chat reports.
    #[arg(long)]
    pub store: String,

    /// Location inside the store, e.g. "Dialog - Till".
    #[arg(long)]
    pub location: String,

    #[arg(long = "user-name")]
    pub user_name: Option<String>,
}

/// Records where this machine sits so later reports can be attributed.
pub fn run_setup(home: &Path, args: SetupArgs) -> anyhow::Result<()> {
    let SetupArgs {
        store,
        location,
        user_name,
    } = args;
    let store = store.trim().to_string();
    let location = location.trim().to_string();
    if store.is_empty() || location.is_empty() {
        anyhow::bail!("store and location must not be blank");
    }
    let user_name = user_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    write_identity(
        home,
        &Identity {
            store: Some(store.clone()),
            location: Some(location.clone()),
            user_name,
        },
    )
    .context("saving identity")?;
    tracing::info!("first-run setup completed for {store} / {location}");
    println!(
        "Saved {store} / {location} to {}",
        home.join(CONFIG_TOML_FILE).display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use remotehand_config::Config;
    use remotehand_config::EnvOverrides;
    use tempfile::TempDir;

    #[test]
    fn setup_trims_and_persists_identity() {
        let home = TempDir::new().expect("tempdir");
        run_setup(
            home.path(),
            SetupArgs {
                store: " 12 ".to_string(),
                location: "Dialog - Till".to_string(),
                user_name: Some("   ".to_string()),
            },
        )
        .expect("setup");

        let config =
            Config::load_with_overrides(home.path(), EnvOverrides::default()).expect("load");
        assert!(!config.is_first_run());
        assert_eq!(config.identity(), "12 / Dialog - Till");
        assert_eq!(config.identity.user_name, None);
    }

    #[test]
    fn blank_location_is_rejected() {
        let home = TempDir::new().expect("tempdir");
        let err = run_setup(
            home.path(),
            SetupArgs {
                store: "12".to_string(),
                location: " ".to_string(),
                user_name: None,
            },
        )
        .expect_err("blank location");
        assert!(err.to_string().contains("must not be blank"));
        assert!(!home.path().join(CONFIG_TOML_FILE).exists());
    }
}
