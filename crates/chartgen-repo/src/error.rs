//! Repository and chart acquisition errors

use chartgen_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Repository '{name}' is not configured")]
    RepositoryNotFound { name: String },

    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid repository configuration: {message}")]
    InvalidConfig { message: String },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("{operation} timed out after {after}")]
    Timeout { operation: String, after: String },

    #[error("Repository index not found at {url}")]
    IndexNotFound { url: String },

    #[error("Invalid repository index {url}: {message}")]
    InvalidIndex { url: String, message: String },

    #[error("Chart '{name}' not found in repository '{repo}'")]
    ChartNotFound { name: String, repo: String },

    #[error("Version {version} of chart '{name}' not found in repository '{repo}'")]
    VersionNotFound {
        name: String,
        version: String,
        repo: String,
    },

    #[error("No version of '{name}' satisfies '{constraint}' (available: {available})")]
    UnsatisfiableConstraint {
        name: String,
        constraint: String,
        available: String,
    },

    #[error("Integrity check failed for {name}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("git clone of {url} failed: {message}")]
    GitFailed { url: String, message: String },

    #[error("Invalid chart path '{subpath}' in repository {url}: {reason}")]
    InvalidSubpath {
        url: String,
        subpath: String,
        reason: String,
    },

    #[error("Cannot repair dependency '{dependency}' of chart {chart}: {message}")]
    RepairFailed {
        chart: String,
        dependency: String,
        message: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Chart(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// True when the chart itself is fine but its `charts/` is incomplete
    pub fn is_missing_dependencies(&self) -> bool {
        matches!(self, RepoError::Chart(e) if e.is_missing_dependencies())
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        let target = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "request".to_string());

        if e.is_timeout() {
            RepoError::Timeout {
                operation: format!("GET {target}"),
                after: "the repository timeout".to_string(),
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {e}"),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidRepositoryUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}

impl From<semver::Error> for RepoError {
    fn from(e: semver::Error) -> Self {
        RepoError::Chart(CoreError::InvalidVersion(e))
    }
}
