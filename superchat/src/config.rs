//! Config-file loading: `superchat.toml` plus `SUPERCHAT_<SECTION>_<KEY>`
//! environment overrides, composed with `config::Config::builder()
//! .add_source(File::...).add_source(Environment::with_prefix(...))`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use superchat_common::{Config, ConfigStore};
use tracing::info;

/// Loads `path` (defaulting every absent key per `ConfigStore`'s `Default`
/// impl) and resolves `paths_relative_to` to the config file's own
/// directory, so `server.ssh_host_key` and a relative `sqlite://` URL in
/// `database_url` are anchored next to the config rather than the process's
/// current directory.
pub fn load_config(path: &Path) -> Result<Config> {
    let store: ConfigStore = ConfigBuilder::builder()
        .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix("SUPERCHAT").separator("_").list_separator(","))
        .build()
        .with_context(|| format!("loading configuration from {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("parsing configuration at {}", path.display()))?;

    let paths_relative_to = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(path = %path.display(), "configuration loaded");

    Ok(Config { store, paths_relative_to })
}
