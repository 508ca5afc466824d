//! Configuration management
//!
//! Configuration comes from an optional YAML file and is then overridden by
//! `CIEXEC_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::container::ContainerRuntime;

/// Errors raised while loading configuration or build plans
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read '{path}': {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the expected type
    #[error("Invalid YAML in '{path}': {source}")]
    Yaml {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The file is not valid JSON for the expected type
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file extension does not name a supported format
    #[error("Unsupported file format for '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(PathBuf),

    /// Unknown container runtime name
    #[error("Unknown container runtime '{0}': expected docker or podman")]
    UnknownRuntime(String),

    /// A setting has an unusable value
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Container runtime used for containerized runs
    pub runtime: ContainerRuntime,
    /// Program to invoke instead of the runtime's default binary
    pub runtime_binary: Option<String>,
    /// Image used when nothing more specific is known
    pub default_image: String,
    /// Per-command timeout in seconds
    pub timeout_secs: u64,
    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: ContainerRuntime::Docker,
            runtime_binary: None,
            default_image: "ubuntu:latest".to_string(),
            timeout_secs: 300,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds invalid values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `CIEXEC_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name
    ///
    /// # Errors
    ///
    /// Returns an error if an override holds an invalid value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(runtime) = lookup("CIEXEC_RUNTIME") {
            self.runtime = runtime.parse()?;
        }
        if let Some(image) = lookup("CIEXEC_IMAGE") {
            self.default_image = image;
        }
        if let Some(timeout) = lookup("CIEXEC_TIMEOUT_SECS") {
            self.timeout_secs = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CIEXEC_TIMEOUT_SECS",
                value: timeout.clone(),
            })?;
        }
        if let Some(level) = lookup("CIEXEC_LOG_LEVEL") {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Per-command timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_secs",
                value: "0".to_string(),
            });
        }
        if self.default_image.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_image",
                value: self.default_image.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.runtime, ContainerRuntime::Docker);
        assert_eq!(config.default_image, "ubuntu:latest");
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ciexec.yaml");
        std::fs::write(&path, "runtime: podman\ntimeout_secs: 60\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.runtime, ContainerRuntime::Podman);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.default_image, "ubuntu:latest");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/ciexec/missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ciexec.yaml");
        std::fs::write(&path, "timeout_secs: 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "timeout_secs", .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .apply_overrides(lookup_from(&[
                ("CIEXEC_RUNTIME", "podman"),
                ("CIEXEC_IMAGE", "alpine:3.19"),
                ("CIEXEC_TIMEOUT_SECS", "42"),
                ("CIEXEC_LOG_LEVEL", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.runtime, ContainerRuntime::Podman);
        assert_eq!(config.default_image, "alpine:3.19");
        assert_eq!(config.timeout_secs, 42);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_env_override_invalid_runtime() {
        let err = Config::default()
            .apply_overrides(lookup_from(&[("CIEXEC_RUNTIME", "lxc")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRuntime(name) if name == "lxc"));
    }

    #[test]
    fn test_env_override_invalid_timeout() {
        let err = Config::default()
            .apply_overrides(lookup_from(&[("CIEXEC_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for CIEXEC_TIMEOUT_SECS: 'soon'");
    }
}
