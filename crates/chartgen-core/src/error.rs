//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid chart {origin}: {message}")]
    InvalidChart { origin: String, message: String },

    #[error("Invalid chart archive {origin}: {message}")]
    Archive { origin: String, message: String },

    #[error("Chart {chart} has missing or outdated dependencies: {}", .missing.join(", "))]
    MissingDependencies { chart: String, missing: Vec<String> },

    #[error("Values must be a mapping at the top level, found {found}")]
    NotAMapping { found: String },

    #[error("Invalid document {origin}: {message}")]
    InvalidDocument { origin: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),
}

impl CoreError {
    /// True when the chart loaded but its `charts/` directory does not satisfy `Chart.yaml`
    pub fn is_missing_dependencies(&self) -> bool {
        matches!(self, CoreError::MissingDependencies { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
