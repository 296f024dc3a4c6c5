//! Chart acquisition
//!
//! [`ChartResolver`] turns a [`ChartSource`] into a [`LoadedChart`]. Local
//! and cloned charts get one dependency repair attempt; repository charts
//! are taken as published.

use chartgen_core::{ChartSource, LoadedChart};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::backend::create_backend;
use crate::config::RepositoryConfig;
use crate::dependency::{DependencyRepair, RepositoryRepair};
use crate::error::{RepoError, Result};
use crate::git::{DEFAULT_GIT_TIMEOUT, GitCloner};
use crate::index::VersionSpec;

/// Settings for [`ChartResolver::new`]
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub git_binary: PathBuf,
    pub git_timeout: Duration,
    /// Repository configuration file, the user default when `None`
    pub repository_config: Option<PathBuf>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
            git_timeout: DEFAULT_GIT_TIMEOUT,
            repository_config: None,
        }
    }
}

pub struct ChartResolver {
    runtime: Runtime,
    repositories: RepositoryConfig,
    git: GitCloner,
    repair: Box<dyn DependencyRepair>,
    cancel: CancellationToken,
}

impl ChartResolver {
    pub fn new(options: ResolverOptions) -> Result<Self> {
        let repositories = match &options.repository_config {
            Some(path) => RepositoryConfig::load_or_default(path)?,
            None => RepositoryConfig::load()?,
        };
        Self::with_config(repositories, GitCloner::new(options.git_binary, options.git_timeout))
    }

    pub fn with_config(repositories: RepositoryConfig, git: GitCloner) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            repair: Box::new(RepositoryRepair::new(repositories.clone())),
            repositories,
            git,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the dependency repair strategy
    pub fn with_repair(mut self, repair: impl DependencyRepair + 'static) -> Self {
        self.repair = Box::new(repair);
        self
    }

    /// Share a caller-owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts an in-flight resolution when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Acquire the chart `source` points at
    ///
    /// Cancelling the token abandons whatever step is in flight (clone,
    /// download or repair) and returns [`RepoError::Cancelled`]. Dropping
    /// the abandoned work removes its temporary workspace.
    pub fn resolve(&self, source: &ChartSource) -> Result<LoadedChart> {
        tracing::debug!(source = %source, "resolving chart");
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!(source = %source, "chart resolution cancelled");
                    Err(RepoError::Cancelled)
                }
                result = self.resolve_async(source) => result,
            }
        })
    }

    async fn resolve_async(&self, source: &ChartSource) -> Result<LoadedChart> {
        match source {
            ChartSource::Local { path } => self.load_with_repair(path).await,
            ChartSource::Git {
                url,
                reference,
                subpath,
            } => self.resolve_git(url, reference.as_deref(), subpath).await,
            ChartSource::Repository { url, name, version } => {
                self.resolve_repository(url, name, version.as_deref()).await
            }
        }
    }

    /// Load, and on a dependency failure repair once and reload
    async fn load_with_repair(&self, path: &Path) -> Result<LoadedChart> {
        let chart = LoadedChart::load(path)?;
        let missing = match chart.check_dependencies() {
            Ok(()) => return Ok(chart),
            Err(e) if e.is_missing_dependencies() => e,
            Err(e) => return Err(e.into()),
        };

        let Some(root) = chart.root.clone() else {
            return Err(missing.into());
        };

        tracing::warn!(chart = %chart.metadata.name, "{missing}, repairing");
        self.repair.repair(&chart, &root).await?;

        let chart = LoadedChart::load(path)?;
        chart.check_dependencies()?;
        tracing::info!(chart = %chart.metadata.name, "dependencies repaired");
        Ok(chart)
    }

    async fn resolve_git(
        &self,
        url: &str,
        reference: Option<&str>,
        subpath: &Path,
    ) -> Result<LoadedChart> {
        let escapes = subpath
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RepoError::InvalidSubpath {
                url: url.to_string(),
                subpath: subpath.display().to_string(),
                reason: "must stay inside the repository".to_string(),
            });
        }

        let workspace = tempfile::Builder::new().prefix("chartgen-").tempdir()?;
        let checkout = workspace.path().join("checkout");

        self.git
            .shallow_clone(url, reference, &checkout, &self.cancel)
            .await?;

        let chart_dir = checkout.join(subpath);
        if !chart_dir.is_dir() {
            return Err(RepoError::InvalidSubpath {
                url: url.to_string(),
                subpath: subpath.display().to_string(),
                reason: "no such directory in the clone".to_string(),
            });
        }

        self.load_with_repair(&chart_dir).await
    }

    async fn resolve_repository(
        &self,
        url: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<LoadedChart> {
        let repo = self.repositories.resolve(url)?;
        let origin = format!("{}/{name}", repo.url.trim_end_matches('/'));
        let backend = create_backend(repo)?;

        let spec = VersionSpec::parse(version)?;
        let (entry, data) = backend.fetch_chart(name, &spec).await?;

        let chart = LoadedChart::from_archive_bytes(&data, &format!("{origin}-{}", entry.version))?;
        chart.check_dependencies()?;
        Ok(chart)
    }
}
