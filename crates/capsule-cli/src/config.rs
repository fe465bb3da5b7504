//! Configuration file discovery.
//!
//! Lookup order (first existing file wins):
//! 1. `--config PATH` (must exist)
//! 2. `./capsule.toml`
//! 3. `<config dir>/capsule/config.toml`
//! 4. built-in defaults

use std::path::{Path, PathBuf};

use capsule_core::{CapsuleConfig, ConfigError};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Candidate files in lookup order.
fn candidates(cwd: &Path, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join("capsule.toml")];
    if let Some(dir) = config_dir {
        paths.push(dir.join("capsule").join("config.toml"));
    }
    paths
}

/// Resolve and load the effective configuration.
///
/// # Errors
///
/// Fails if an explicit path is missing, or if the chosen file cannot be
/// read, parsed, or validated.
pub fn load(explicit: Option<&Path>) -> Result<CapsuleConfig, ConfigLoadError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ConfigLoadError::Missing(path.to_path_buf()));
        }
        return load_file(path);
    }

    let cwd = std::env::current_dir().unwrap_or_default();
    let config_dir = dirs::config_dir();
    for path in candidates(&cwd, config_dir.as_deref()) {
        if path.is_file() {
            return load_file(&path);
        }
    }

    debug!("no config file found, using defaults");
    Ok(CapsuleConfig::default())
}

fn load_file(path: &Path) -> Result<CapsuleConfig, ConfigLoadError> {
    debug!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    CapsuleConfig::from_toml_str(&content).map_err(|source| ConfigLoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}
