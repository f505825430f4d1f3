pub mod batch;
pub mod config;
pub mod engines;
pub mod process;

use std::path::{Path, PathBuf};

use tracing::debug;

use invx_core::models::config::InvxConfig;

/// `<config_dir>/invx/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invx")
        .join("config.json")
}

/// Resolve the config file: the explicit path, else the default location.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load the configuration used by the extraction commands.
///
/// An explicit `--config` file must exist; the default file is optional.
/// Environment overrides apply on top, then `--offline`.
pub fn load_config(config_path: Option<&str>, offline: bool) -> anyhow::Result<InvxConfig> {
    let config = match config_path {
        Some(path) => InvxConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Using config file {}", path.display());
                InvxConfig::from_file(&path)?
            } else {
                InvxConfig::default()
            }
        }
    };

    let config = config.with_env_overrides();
    Ok(if offline { config.offline() } else { config })
}
