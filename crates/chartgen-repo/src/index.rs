//! Helm-compatible repository index

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{RepoError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Charts indexed by name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartEntry>>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl RepositoryIndex {
    /// Parse an `index.yaml` fetched from `url`
    pub fn from_bytes(bytes: &[u8], url: &str) -> Result<Self> {
        serde_yaml::from_slice(bytes).map_err(|e| RepoError::InvalidIndex {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub fn add_entry(&mut self, entry: ChartEntry) {
        self.entries
            .entry(entry.name.clone())
            .or_default()
            .push(entry);
    }

    /// Highest semver version of a chart
    pub fn get_latest(&self, name: &str) -> Option<&ChartEntry> {
        self.entries.get(name)?.iter().max_by(compare_versions)
    }

    pub fn get_version(&self, name: &str, version: &Version) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.parsed_version().as_ref() == Some(version))
    }

    /// Highest version satisfying `req`
    pub fn find_best_match(&self, name: &str, req: &VersionReq) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .filter(|e| e.parsed_version().is_some_and(|v| req.matches(&v)))
            .max_by(compare_versions)
    }

    /// Select the entry `spec` asks for, `repo` names the repository in errors
    pub fn select(&self, name: &str, spec: &VersionSpec, repo: &str) -> Result<&ChartEntry> {
        if !self.entries.contains_key(name) {
            return Err(RepoError::ChartNotFound {
                name: name.to_string(),
                repo: repo.to_string(),
            });
        }

        let found = match spec {
            VersionSpec::Latest => self.get_latest(name),
            VersionSpec::Exact(version) => self.get_version(name, version),
            VersionSpec::Range(req) => self.find_best_match(name, req),
        };

        found.ok_or_else(|| match spec {
            VersionSpec::Exact(version) => RepoError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
                repo: repo.to_string(),
            },
            _ => RepoError::UnsatisfiableConstraint {
                name: name.to_string(),
                constraint: spec.to_string(),
                available: self.available(name).join(", "),
            },
        })
    }

    fn available(&self, name: &str) -> Vec<&str> {
        self.entries
            .get(name)
            .map(|v| v.iter().map(|e| e.version.as_str()).collect())
            .unwrap_or_default()
    }
}

fn compare_versions(a: &&ChartEntry, b: &&ChartEntry) -> Ordering {
    match (a.parsed_version(), b.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.version.cmp(&b.version),
    }
}

/// A chart version in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Archive locations, absolute or relative to the repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA-256 of the archive
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartEntry {
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(self.version.trim_start_matches('v')).ok()
    }
}

/// Which version of a chart to fetch
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSpec {
    Latest,
    Exact(Version),
    Range(VersionReq),
}

impl VersionSpec {
    /// A full version pins exactly; anything else is a semver range
    ///
    /// `None`, an empty string and `*` select the latest version.
    pub fn parse(spec: Option<&str>) -> Result<Self> {
        let spec = spec.map(str::trim).unwrap_or_default();
        if spec.is_empty() || spec == "*" {
            return Ok(VersionSpec::Latest);
        }
        if let Ok(version) = Version::parse(spec.trim_start_matches('v')) {
            return Ok(VersionSpec::Exact(version));
        }
        Ok(VersionSpec::Range(VersionReq::parse(spec)?))
    }
}

impl From<Option<VersionReq>> for VersionSpec {
    fn from(req: Option<VersionReq>) -> Self {
        req.map_or(VersionSpec::Latest, VersionSpec::Range)
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Exact(v) => write!(f, "{v}"),
            VersionSpec::Range(r) => write!(f, "{r}"),
        }
    }
}
