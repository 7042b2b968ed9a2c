//! Configuration types for Sift.
//!
//! A single `sift.yaml` names the schema registry file, the upstream Postgres
//! connection, audit logging and log level. Relative paths inside the file are
//! resolved against the directory the file lives in.
//!
//! ```yaml
//! project: insurance-analytics
//! registry_file: schema/registry.yaml
//! upstream:
//!   database_url_env: DATABASE_URL
//! audit:
//!   directory: logs/audit
//! logging:
//!   level: debug
//! ```

pub mod audit;
pub mod logging;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{RegistryError, SchemaRegistry};

pub use audit::AuditConfig;
pub use logging::LoggingConfig;
pub use upstream::{ConnectionPoolConfig, SslMode, UpstreamConfig};

/// Complete Sift configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiftConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Path to the schema registry YAML. The bundled registry is used when absent.
    #[serde(default)]
    pub registry_file: Option<PathBuf>,

    /// Upstream Postgres connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SiftConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve relative paths against the file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(registry_file) = &config.registry_file {
            let resolved = resolve(&base_dir, registry_file);
            if !resolved.exists() {
                return Err(ConfigError::Config(format!(
                    "registry file not found: {}",
                    resolved.display()
                )));
            }
            config.registry_file = Some(resolved);
        }

        if let Some(directory) = &config.audit.directory {
            config.audit.directory = Some(resolve(&base_dir, directory));
        }

        Ok(config)
    }

    /// Load the schema registry this configuration points at.
    pub fn load_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let registry = match &self.registry_file {
            Some(path) => SchemaRegistry::from_file(path)?,
            None => SchemaRegistry::builtin()?,
        };
        Ok(registry)
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
