//! Dependency repair
//!
//! Repair fetches every statically enabled dependency of a directory chart
//! into `charts/<name>-<version>.tgz`, the same layout `helm dependency
//! update` produces.

use async_trait::async_trait;
use chartgen_core::{Dependency, LoadedChart};
use semver::Version;
use std::path::{Path, PathBuf};

use crate::backend::{create_backend, read_chart_bytes};
use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::index::VersionSpec;

/// Makes a chart directory's `charts/` satisfy its declared dependencies
#[async_trait]
pub trait DependencyRepair: Send + Sync {
    /// Repair the dependencies of `chart`, loaded from the directory `root`
    async fn repair(&self, chart: &LoadedChart, root: &Path) -> Result<()>;
}

/// Downloads dependencies from their chart repositories
pub struct RepositoryRepair {
    repositories: RepositoryConfig,
}

impl RepositoryRepair {
    pub fn new(repositories: RepositoryConfig) -> Self {
        Self { repositories }
    }

    async fn fetch(&self, dep: &Dependency, chart: &LoadedChart, root: &Path) -> Result<(String, Vec<u8>)> {
        let failed = |message: String| RepoError::RepairFailed {
            chart: chart.metadata.name.clone(),
            dependency: dep.name.clone(),
            message,
        };

        if let Some(local) = dep.repository.strip_prefix("file://") {
            let dir = root.join(local);
            let sub = LoadedChart::load(&dir).map_err(|e| failed(e.to_string()))?;
            if let Some(req) = dep.version_req()? {
                if !req.matches(&sub.metadata.version) {
                    return Err(failed(format!(
                        "{} is version {}, {} required",
                        dir.display(),
                        sub.metadata.version,
                        dep.version
                    )));
                }
            }
            let data = read_chart_bytes(&dir, &dep.name)?;
            return Ok((sub.metadata.version.to_string(), data));
        }

        if dep.repository.trim().is_empty() {
            return Err(failed("no repository declared".to_string()));
        }

        let repo = self.repositories.resolve(&dep.repository)?;
        let backend = create_backend(repo)?;
        let spec = VersionSpec::from(dep.version_req()?);
        let (entry, data) = backend.fetch_chart(&dep.name, &spec).await?;
        Ok((entry.version, data))
    }
}

#[async_trait]
impl DependencyRepair for RepositoryRepair {
    async fn repair(&self, chart: &LoadedChart, root: &Path) -> Result<()> {
        let charts_dir = root.join("charts");
        std::fs::create_dir_all(&charts_dir)?;

        for dep in chart.metadata.dependencies.iter().filter(|d| d.enabled) {
            tracing::info!(
                chart = %chart.metadata.name,
                dependency = %dep.name,
                constraint = %dep.version,
                repository = %dep.repository,
                "fetching dependency"
            );

            let (version, data) = self.fetch(dep, chart, root).await?;

            for stale in stale_archives(&charts_dir, &dep.name)? {
                tracing::debug!(path = %stale.display(), "removing outdated dependency archive");
                std::fs::remove_file(&stale)?;
            }

            let target = charts_dir.join(format!("{}-{}.tgz", dep.name, version));
            std::fs::write(&target, data)?;
            tracing::debug!(path = %target.display(), "dependency written");
        }

        Ok(())
    }
}

/// `charts/<name>-<semver>.tgz` archives of a dependency
fn stale_archives(charts_dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{name}-");
    let mut found = Vec::new();

    for entry in std::fs::read_dir(charts_dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_versioned = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".tgz"))
            .is_some_and(|version| Version::parse(version).is_ok());
        if is_versioned && path.is_file() {
            found.push(path);
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chart(dir: &Path, chart_yaml: &str) {
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(dir.join("Chart.yaml"), chart_yaml).unwrap();
        std::fs::write(dir.join("templates/cm.yaml"), "kind: ConfigMap\n").unwrap();
    }

    #[test]
    fn test_stale_archives() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["redis-1.0.0.tgz", "redis-2.1.0.tgz", "redis-cluster-1.0.0.tgz", "redis.tgz"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let mut stale = stale_archives(dir.path(), "redis").unwrap();
        stale.sort();
        let names: Vec<_> = stale
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["redis-1.0.0.tgz", "redis-2.1.0.tgz"]);
    }

    #[tokio::test]
    async fn test_repair_from_repository_directory() {
        let repo = tempfile::tempdir().unwrap();
        write_chart(&repo.path().join("redis"), "apiVersion: v2\nname: redis\nversion: 2.0.0\n");

        let app = tempfile::tempdir().unwrap();
        write_chart(
            app.path(),
            &format!(
                "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: ^2\n    repository: {}\n",
                repo.path().display()
            ),
        );
        let chart = LoadedChart::load(app.path()).unwrap();
        assert!(chart.check_dependencies().is_err());

        RepositoryRepair::new(RepositoryConfig::default())
            .repair(&chart, app.path())
            .await
            .unwrap();

        let repaired = LoadedChart::load(app.path()).unwrap();
        repaired.check_dependencies().unwrap();
        assert!(app.path().join("charts/redis-2.0.0.tgz").is_file());
    }

    #[tokio::test]
    async fn test_repair_replaces_outdated_archive() {
        let repo = tempfile::tempdir().unwrap();
        write_chart(&repo.path().join("redis"), "apiVersion: v2\nname: redis\nversion: 2.0.0\n");
        let old = tempfile::tempdir().unwrap();
        write_chart(old.path(), "apiVersion: v2\nname: redis\nversion: 1.0.0\n");

        let app = tempfile::tempdir().unwrap();
        write_chart(
            app.path(),
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: ^2\n    repository: '@local'\n",
        );
        std::fs::create_dir_all(app.path().join("charts")).unwrap();
        std::fs::write(
            app.path().join("charts/redis-1.0.0.tgz"),
            chartgen_core::archive::create_archive(old.path(), "redis").unwrap(),
        )
        .unwrap();

        let chart = LoadedChart::load(app.path()).unwrap();
        assert!(chart.check_dependencies().unwrap_err().is_missing_dependencies());

        let config: RepositoryConfig = serde_yaml::from_str(&format!(
            "repositories:\n  - name: local\n    url: {}\n",
            repo.path().display()
        ))
        .unwrap();
        RepositoryRepair::new(config).repair(&chart, app.path()).await.unwrap();

        assert!(!app.path().join("charts/redis-1.0.0.tgz").exists());
        let repaired = LoadedChart::load(app.path()).unwrap();
        repaired.check_dependencies().unwrap();
        assert_eq!(repaired.subcharts.len(), 1);
    }

    #[tokio::test]
    async fn test_repair_local_file_dependency() {
        let workspace = tempfile::tempdir().unwrap();
        let app = workspace.path().join("app");
        write_chart(
            &app,
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: common\n    version: ^0.3\n    repository: file://../common\n",
        );
        write_chart(
            &workspace.path().join("common"),
            "apiVersion: v2\nname: common\nversion: 0.3.1\ntype: library\n",
        );

        let chart = LoadedChart::load(&app).unwrap();
        RepositoryRepair::new(RepositoryConfig::default())
            .repair(&chart, &app)
            .await
            .unwrap();

        assert!(app.join("charts/common-0.3.1.tgz").is_file());
        LoadedChart::load(&app).unwrap().check_dependencies().unwrap();
    }

    #[tokio::test]
    async fn test_repair_local_version_mismatch() {
        let workspace = tempfile::tempdir().unwrap();
        let app = workspace.path().join("app");
        write_chart(
            &app,
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: common\n    version: ^1\n    repository: file://../common\n",
        );
        write_chart(
            &workspace.path().join("common"),
            "apiVersion: v2\nname: common\nversion: 0.3.1\n",
        );

        let chart = LoadedChart::load(&app).unwrap();
        let err = RepositoryRepair::new(RepositoryConfig::default())
            .repair(&chart, &app)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::RepairFailed { .. }));
    }

    #[tokio::test]
    async fn test_repair_without_repository_fails() {
        let app = tempfile::tempdir().unwrap();
        write_chart(
            app.path(),
            "apiVersion: v2\nname: app\nversion: 1.0.0\ndependencies:\n  - name: redis\n    version: ^2\n",
        );
        let chart = LoadedChart::load(app.path()).unwrap();

        let err = RepositoryRepair::new(RepositoryConfig::default())
            .repair(&chart, app.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::RepairFailed { dependency, .. } if dependency == "redis"));
    }
}
