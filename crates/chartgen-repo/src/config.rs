//! Repository configuration
//!
//! Named chart repositories live in `<config dir>/chartgen/repositories.yaml`:
//!
//! ```yaml
//! repositories:
//!   - name: bitnami
//!     url: https://charts.bitnami.com/bitnami
//!     timeout: 45s
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RepoError, Result};

/// Request timeout for repositories that do not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl RepositoryConfig {
    /// Load from the default location, empty when the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_or_default(&Self::default_path()?)
    }

    /// Load from `path`, empty when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no repository configuration");
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| RepoError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("chartgen").join("repositories.yaml"))
    }

    /// Get a repository by name
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Turn a chart's repository reference into a repository
    ///
    /// Accepts a configured name (optionally written `@name` or `alias:name`
    /// as in Helm dependency lists), a configured URL, or any `http(s)://`
    /// or `file://` URL.
    pub fn resolve(&self, reference: &str) -> Result<Repository> {
        let reference = reference.trim();
        let alias = reference
            .strip_prefix('@')
            .or_else(|| reference.strip_prefix("alias:"));

        if let Some(name) = alias {
            return self.get(name).cloned().ok_or_else(|| RepoError::RepositoryNotFound {
                name: name.to_string(),
            });
        }

        if let Some(repo) = self.get(reference) {
            return Ok(repo.clone());
        }

        let wanted = reference.trim_end_matches('/');
        if let Some(repo) = self
            .repositories
            .iter()
            .find(|r| r.url.trim_end_matches('/') == wanted)
        {
            return Ok(repo.clone());
        }

        if reference.contains("://") || reference.starts_with('/') {
            return Repository::new(reference, reference);
        }

        Err(RepoError::RepositoryNotFound {
            name: reference.to_string(),
        })
    }
}

/// A chart repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,

    /// `http(s)://` index repository or `file://` directory
    pub url: String,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let repo = Self {
            name: name.into(),
            url: url.into(),
            timeout: None,
        };
        repo.repo_type()?;
        Ok(repo)
    }

    pub fn repo_type(&self) -> Result<RepositoryType> {
        RepositoryType::detect(&self.url)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Location of `index.yaml` for HTTP repositories
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// Helm-style repository serving `index.yaml`
    Http,
    /// Local directory of charts
    File,
}

impl RepositoryType {
    /// Detect the repository type from its URL scheme
    pub fn detect(url: &str) -> Result<Self> {
        if url.starts_with("file://") || url.starts_with('/') {
            Ok(RepositoryType::File)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Ok(RepositoryType::Http)
        } else {
            Err(RepoError::InvalidRepositoryUrl {
                url: url.to_string(),
                reason: "URL must start with http://, https://, file:// or /".to_string(),
            })
        }
    }
}
