//! Repository analysis records
//!
//! Stack detection happens upstream; this module only models the record it
//! produces so a run can be driven from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::infrastructure::ConfigError;

/// Technology stack detected in a repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectLanguage {
    /// Nothing recognised
    #[default]
    Unknown,
    /// .NET (`*.csproj`)
    DotNet,
    /// Node.js (`package.json`)
    NodeJs,
    /// Go modules (`go.mod`)
    Go,
    /// Python (`requirements.txt`, `setup.py`, `pyproject.toml`)
    Python,
    /// Java (Maven or Gradle)
    Java,
}

impl ProjectLanguage {
    /// Build image conventionally used for this stack, if there is one
    #[must_use]
    pub fn default_image(self) -> Option<&'static str> {
        match self {
            Self::DotNet => Some("mcr.microsoft.com/dotnet/sdk:8.0"),
            Self::NodeJs => Some("node:18-alpine"),
            Self::Go => Some("golang:1.21"),
            Self::Python => Some("python:3.10"),
            Self::Java | Self::Unknown => None,
        }
    }
}

/// What the analyzer found in a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepoAnalysis {
    /// Detected language
    pub language: ProjectLanguage,
    /// Human-readable framework name, e.g. "Maven"
    pub framework: Option<String>,
    /// Whether the repository ships a Dockerfile
    pub has_dockerfile: bool,
    /// Build commands in the order they should run
    pub suggested_build_commands: Vec<String>,
}

impl RepoAnalysis {
    /// Loads an analysis record from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has another extension,
    /// or does not hold a valid record.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match extension.as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}
