//! Configuration management for use-cdn

pub mod overrides;
pub mod schema;

pub use overrides::{Overrides, OVERRIDES_ENV};
pub use schema::{CdnConfig, Config, FileSpec, PackageSpec, ResolverConfig, VersionedPath};

use crate::error::{UseCdnError, UseCdnResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "use-cdn.toml";

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "USE_CDN_CONFIG";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate the configuration. A missing file is an error.
    pub async fn load(&self) -> UseCdnResult<Config> {
        let path = &self.config_path;
        let exists = fs::try_exists(path)
            .await
            .map_err(|e| UseCdnError::io(format!("checking {}", path.display()), e))?;
        if !exists {
            return Err(UseCdnError::ConfigNotFound(path.clone()));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| UseCdnError::io(format!("reading config from {}", path.display()), e))?;
        parse(path, &content)
    }

    /// Load the configuration if the file exists
    pub async fn load_optional(&self) -> UseCdnResult<Option<Config>> {
        match self.load().await {
            Ok(config) => Ok(Some(config)),
            Err(UseCdnError::ConfigNotFound(path)) => {
                debug!("Config file {} not found", path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Blocking variant of [`load`](Self::load) for callers without a runtime
    pub fn load_blocking(&self) -> UseCdnResult<Config> {
        let path = &self.config_path;
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UseCdnError::ConfigNotFound(path.clone())
            } else {
                UseCdnError::io(format!("reading config from {}", path.display()), e)
            }
        })?;
        parse(path, &content)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse configuration text. `.json` files are JSON, anything else TOML.
///
/// A JSON document may also be a bare array of packages.
pub fn parse(path: &Path, content: &str) -> UseCdnResult<Config> {
    let invalid = |reason: String| UseCdnError::ConfigInvalid {
        path: path.to_path_buf(),
        reason,
    };

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        if value.is_array() {
            let packages = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            Config::from_packages(packages)
        } else {
            serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?
        }
    } else {
        toml::from_str(content).map_err(|e| invalid(e.to_string()))?
    };

    config.validate().map_err(invalid)?;
    debug!(
        "Loaded {} package(s) from {}",
        config.packages.len(),
        path.display()
    );
    Ok(config)
}
