//! Layered configuration loading
//!
//! Sources are applied in order: serde defaults, an optional TOML file, then
//! environment variables carrying the given prefix (`COURIER__EXECUTOR__QUEUE_CAPACITY`).

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a configuration value of type `T`.
///
/// A missing `path` means "defaults plus environment only". When `path` is
/// given the file must exist.
pub fn load_config<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        info!("Loading configuration file: {:?}", path);
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build().context("Failed to build configuration")?;

    debug!(prefix = env_prefix, "Configuration sources merged");
    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Pick the config file path from `env_var` if set, else `default`.
///
/// Returns `None` when neither points at an existing file.
pub fn resolve_config_path(env_var: &str, default: &str) -> Option<PathBuf> {
    let candidate = std::env::var(env_var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default));
    candidate.exists().then_some(candidate)
}

/// Expand `$VAR` / `${VAR}` references in a configuration string
pub fn expand_env(value: &str) -> Result<String> {
    let expanded = shellexpand::env(value)
        .with_context(|| format!("Failed to expand environment in {value:?}"))?;
    Ok(expanded.into_owned())
}
