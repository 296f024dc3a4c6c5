//! Repository backends
//!
//! One interface over HTTP index repositories and local chart directories.

use async_trait::async_trait;
use chartgen_core::{LoadedChart, archive};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config::{Repository, RepositoryType};
use crate::error::{RepoError, Result};
use crate::index::{ChartEntry, RepositoryIndex, VersionSpec};

#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    /// Fetch the current index
    async fn fetch_index(&self) -> Result<RepositoryIndex>;

    /// Fetch the raw `.tgz` of an index entry
    async fn fetch_archive(&self, entry: &ChartEntry) -> Result<Vec<u8>>;

    /// Look up `name` per `spec`, download it and verify its digest
    async fn fetch_chart(&self, name: &str, spec: &VersionSpec) -> Result<(ChartEntry, Vec<u8>)> {
        let index = self.fetch_index().await?;
        let entry = index.select(name, spec, self.name())?.clone();
        if entry.deprecated {
            tracing::warn!(chart = %name, version = %entry.version, "chart version is deprecated");
        }

        tracing::info!(chart = %name, version = %entry.version, repo = %self.url(), "downloading chart");
        let data = self.fetch_archive(&entry).await?;
        if let Some(expected) = &entry.digest {
            verify_digest(&entry.name, expected, &data)?;
        }
        Ok((entry, data))
    }
}

/// Create a backend for a repository
pub fn create_backend(repo: Repository) -> Result<Box<dyn RepositoryBackend>> {
    match repo.repo_type()? {
        RepositoryType::Http => Ok(Box::new(HttpBackend::new(repo)?)),
        RepositoryType::File => Ok(Box::new(FileBackend::new(repo)?)),
    }
}

/// SHA-256 digest of `data` in `sha256:<hex>` form
pub fn compute_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Check `data` against an index digest, with or without a `sha256:` prefix
pub fn verify_digest(name: &str, expected: &str, data: &[u8]) -> Result<()> {
    let actual = compute_digest(data);
    if normalize_digest(expected) == normalize_digest(&actual) {
        Ok(())
    } else {
        Err(RepoError::IntegrityCheckFailed {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

fn normalize_digest(digest: &str) -> String {
    let digest = digest.trim().to_lowercase();
    digest
        .strip_prefix("sha256:")
        .or_else(|| digest.strip_prefix("sha256-"))
        .unwrap_or(&digest)
        .to_string()
}

/// Helm-style repository serving `index.yaml` over HTTP(S)
pub struct HttpBackend {
    repo: Repository,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(repo: Repository) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(repo.timeout())
            .user_agent(concat!("chartgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;
        Ok(Self { repo, client })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("{url} not found"),
            });
        }
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {url} failed"),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Entry URLs may be relative to the repository URL
    fn absolute_url(&self, url: &str) -> Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        let base = url::Url::parse(&format!("{}/", self.repo.url.trim_end_matches('/')))?;
        Ok(base.join(url)?.to_string())
    }
}

#[async_trait]
impl RepositoryBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.repo.name
    }

    fn url(&self) -> &str {
        &self.repo.url
    }

    async fn fetch_index(&self) -> Result<RepositoryIndex> {
        let index_url = self.repo.index_url();
        tracing::debug!(url = %index_url, "fetching repository index");
        let data = self.get_bytes(&index_url).await.map_err(|e| match e {
            RepoError::HttpError { status: 404, .. } => RepoError::IndexNotFound {
                url: index_url.clone(),
            },
            other => other,
        })?;
        RepositoryIndex::from_bytes(&data, &index_url)
    }

    async fn fetch_archive(&self, entry: &ChartEntry) -> Result<Vec<u8>> {
        let url = entry.download_url().ok_or_else(|| RepoError::ChartNotFound {
            name: format!("{} {}", entry.name, entry.version),
            repo: self.repo.name.clone(),
        })?;
        self.get_bytes(&self.absolute_url(url)?).await
    }
}

/// Directory of charts, with or without an `index.yaml`
///
/// Without an index, every chart directory and `.tgz` archive directly
/// under the root is an entry.
pub struct FileBackend {
    repo: Repository,
    root: PathBuf,
}

impl FileBackend {
    pub fn new(repo: Repository) -> Result<Self> {
        let root = if repo.url.starts_with("file://") {
            url::Url::parse(&repo.url)?
                .to_file_path()
                .map_err(|()| RepoError::InvalidRepositoryUrl {
                    url: repo.url.clone(),
                    reason: "not a local path".to_string(),
                })?
        } else {
            PathBuf::from(&repo.url)
        };

        if !root.is_dir() {
            return Err(RepoError::IndexNotFound {
                url: repo.url.clone(),
            });
        }

        Ok(Self { repo, root })
    }

    fn scan(&self) -> Result<RepositoryIndex> {
        let mut index = RepositoryIndex::default();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        for path in paths {
            let is_archive = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.ends_with(".tgz") || n.ends_with(".tar.gz"));
            let is_chart_dir = path.join("Chart.yaml").is_file();
            if !is_archive && !is_chart_dir {
                continue;
            }

            let chart = match LoadedChart::load(&path) {
                Ok(chart) => chart,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable chart");
                    continue;
                }
            };
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };

            index.add_entry(ChartEntry {
                name: chart.metadata.name,
                version: chart.metadata.version.to_string(),
                app_version: chart.metadata.app_version,
                description: chart.metadata.description,
                urls: vec![relative.to_string_lossy().into_owned()],
                digest: None,
                deprecated: false,
            });
        }

        Ok(index)
    }

    fn local_path(&self, url: &str) -> Result<PathBuf> {
        let path = if url.starts_with("file://") {
            url::Url::parse(url)?
                .to_file_path()
                .map_err(|()| RepoError::InvalidRepositoryUrl {
                    url: url.to_string(),
                    reason: "not a local path".to_string(),
                })?
        } else {
            self.root.join(url)
        };
        Ok(path)
    }
}

#[async_trait]
impl RepositoryBackend for FileBackend {
    fn name(&self) -> &str {
        &self.repo.name
    }

    fn url(&self) -> &str {
        &self.repo.url
    }

    async fn fetch_index(&self) -> Result<RepositoryIndex> {
        let index_path = self.root.join("index.yaml");
        if index_path.is_file() {
            let data = std::fs::read(&index_path)?;
            return RepositoryIndex::from_bytes(&data, &index_path.display().to_string());
        }
        self.scan()
    }

    async fn fetch_archive(&self, entry: &ChartEntry) -> Result<Vec<u8>> {
        let url = entry.download_url().ok_or_else(|| RepoError::ChartNotFound {
            name: format!("{} {}", entry.name, entry.version),
            repo: self.repo.name.clone(),
        })?;
        let path = self.local_path(url)?;
        read_chart_bytes(&path, &entry.name)
    }
}

/// Archive bytes of a chart directory or `.tgz` file
pub(crate) fn read_chart_bytes(path: &Path, name: &str) -> Result<Vec<u8>> {
    if path.is_dir() {
        Ok(archive::create_archive(path, name)?)
    } else {
        Ok(std::fs::read(path)?)
    }
}
