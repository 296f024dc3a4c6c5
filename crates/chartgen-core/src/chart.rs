//! Chart definition and loading

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::archive::{self, FileTree};
use crate::error::{CoreError, Result};
use crate::values::Values;

/// Chart metadata as declared in `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// `v1` or `v2`
    pub api_version: String,

    pub name: String,

    /// Chart version (SemVer)
    #[serde(with = "version_serde")]
    pub version: Version,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: ChartKind,

    /// Kubernetes version constraint
    #[serde(default)]
    pub kube_version: Option<String>,

    #[serde(default)]
    pub home: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Chart type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Application,
    /// Provides helpers only, renders nothing
    Library,
}

/// Chart dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Dependency name (the subchart's `Chart.yaml` name)
    pub name: String,

    /// Version constraint (semver), empty means any version
    #[serde(default)]
    pub version: String,

    /// Repository URL, `file://` path, or configured repository name
    #[serde(default)]
    pub repository: String,

    /// Static enable/disable flag
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Comma-separated value paths; the first one holding a boolean decides
    #[serde(default)]
    pub condition: Option<String>,

    /// Tags looked up under `tags.<tag>` in the parent's values
    #[serde(default)]
    pub tags: Vec<String>,

    /// Alias name (overrides dependency name for value scoping)
    #[serde(default)]
    pub alias: Option<String>,
}

impl Dependency {
    /// Get the effective name (alias if set, otherwise name)
    #[inline]
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Parsed version constraint, `None` when any version is accepted
    pub fn version_req(&self) -> Result<Option<VersionReq>> {
        let constraint = self.version.trim();
        if constraint.is_empty() || constraint == "*" {
            return Ok(None);
        }
        Ok(Some(VersionReq::parse(constraint)?))
    }

    /// Check if this dependency is rendered given the parent's values
    ///
    /// `enabled: false` always wins. Otherwise the first condition path that
    /// resolves to a boolean decides, then tags, and a dependency with
    /// nothing resolvable is enabled.
    pub fn is_enabled(&self, values: &Values) -> bool {
        if !self.enabled {
            return false;
        }

        if let Some(condition) = &self.condition {
            for path in condition.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match values.get(path) {
                    Some(JsonValue::Bool(b)) => return *b,
                    Some(JsonValue::Null) | None => {}
                    Some(other) => {
                        tracing::warn!(
                            dependency = %self.name,
                            path,
                            value = %other,
                            "condition path is not a boolean, ignoring"
                        );
                    }
                }
            }
        }

        let tag_states: Vec<bool> = self
            .tags
            .iter()
            .filter_map(|tag| values.get(&format!("tags.{tag}")).and_then(JsonValue::as_bool))
            .collect();
        if !tag_states.is_empty() {
            return tag_states.into_iter().any(|enabled| enabled);
        }

        true
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fail on undefined variables
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

fn default_true() -> bool {
    true
}

/// `requirements.yaml` of `apiVersion: v1` charts
#[derive(Debug, Default, Deserialize)]
struct Requirements {
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// A file of the chart, content decoded as UTF-8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFile {
    /// Chart-relative path, e.g. `templates/deployment.yaml`
    pub path: String,
    pub content: String,
}

impl ChartFile {
    /// File name without its directory
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A chart held fully in memory
///
/// Templates and CRDs are sorted by path. `root` is set only when the chart
/// was loaded from a directory, which is the only case where dependencies
/// can be repaired in place.
#[derive(Debug, Clone)]
pub struct LoadedChart {
    pub metadata: ChartMetadata,
    pub root: Option<PathBuf>,
    /// Default values from `values.yaml`
    pub values: Values,
    pub templates: Vec<ChartFile>,
    pub crds: Vec<ChartFile>,
    /// Charts found under `charts/`, directories and archives alike
    pub subcharts: Vec<LoadedChart>,
}

impl LoadedChart {
    /// Load a chart from a directory or a `.tgz` archive
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CoreError::ChartNotFound {
                path: path.display().to_string(),
            });
        }

        if path.is_dir() {
            Self::from_directory(path)
        } else {
            let bytes = std::fs::read(path)?;
            Self::from_archive_bytes(&bytes, &path.display().to_string())
        }
    }

    /// Load a chart directory
    pub fn from_directory(root: &Path) -> Result<Self> {
        let mut files = FileTree::new();

        for entry in walkdir::WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, std::fs::read(entry.path())?);
        }

        let chart = Self::from_files(files, Some(root.to_path_buf()), &root.display().to_string())?;
        tracing::debug!(
            chart = %chart.metadata.name,
            version = %chart.metadata.version,
            path = %root.display(),
            "loaded chart directory"
        );
        Ok(chart)
    }

    /// Load a chart from `.tgz` bytes
    pub fn from_archive_bytes(bytes: &[u8], origin: &str) -> Result<Self> {
        let files = archive::read_archive(bytes, origin)?;
        Self::from_files(files, None, origin)
    }

    /// Build a chart from its file tree
    pub fn from_files(files: FileTree, root: Option<PathBuf>, origin: &str) -> Result<Self> {
        let invalid = |message: String| CoreError::InvalidChart {
            origin: origin.to_string(),
            message,
        };

        let chart_yaml = files
            .get("Chart.yaml")
            .ok_or_else(|| invalid("Chart.yaml not found".to_string()))?;
        let mut metadata: ChartMetadata = serde_yaml::from_slice(chart_yaml)
            .map_err(|e| invalid(format!("Chart.yaml: {e}")))?;

        if !matches!(metadata.api_version.as_str(), "v1" | "v2") {
            return Err(invalid(format!(
                "unsupported apiVersion '{}', expected v1 or v2",
                metadata.api_version
            )));
        }
        if metadata.name.trim().is_empty() {
            return Err(invalid("chart name is empty".to_string()));
        }

        if metadata.api_version == "v1" && metadata.dependencies.is_empty() {
            if let Some(raw) = files.get("requirements.yaml") {
                let requirements: Requirements = serde_yaml::from_slice(raw)
                    .map_err(|e| invalid(format!("requirements.yaml: {e}")))?;
                metadata.dependencies = requirements.dependencies;
            }
        }

        let values = match files.get("values.yaml") {
            Some(raw) => {
                let text = utf8(raw, "values.yaml", &invalid)?;
                Values::from_yaml(&text).map_err(|e| invalid(format!("values.yaml: {e}")))?
            }
            None => Values::new(),
        };

        let mut templates = Vec::new();
        let mut crds = Vec::new();
        let mut nested: BTreeMap<String, FileTree> = BTreeMap::new();
        let mut archives = Vec::new();

        for (path, data) in &files {
            if let Some(rest) = path.strip_prefix("templates/") {
                if has_extension(rest, &["yaml", "yml", "tpl", "j2", "jinja2", "txt", "json"]) {
                    templates.push(ChartFile {
                        path: path.clone(),
                        content: utf8(data, path, &invalid)?,
                    });
                }
            } else if let Some(rest) = path.strip_prefix("crds/") {
                if has_extension(rest, &["yaml", "yml"]) {
                    crds.push(ChartFile {
                        path: path.clone(),
                        content: utf8(data, path, &invalid)?,
                    });
                }
            } else if let Some(rest) = path.strip_prefix("charts/") {
                match rest.split_once('/') {
                    Some((dir, inner)) => {
                        nested
                            .entry(dir.to_string())
                            .or_default()
                            .insert(inner.to_string(), data.clone());
                    }
                    None if has_extension(rest, &["tgz"]) || rest.ends_with(".tar.gz") => {
                        archives.push((path.clone(), data));
                    }
                    None => {}
                }
            }
        }

        let mut subcharts = Vec::new();
        for (dir, tree) in nested {
            // Leftover directories without a Chart.yaml are not charts
            if !tree.contains_key("Chart.yaml") {
                continue;
            }
            let sub_root = root.as_ref().map(|r| r.join("charts").join(&dir));
            let sub_origin = format!("{origin}/charts/{dir}");
            subcharts.push(Self::from_files(tree, sub_root, &sub_origin)?);
        }
        for (path, data) in archives {
            subcharts.push(Self::from_archive_bytes(data, &format!("{origin}/{path}"))?);
        }

        Ok(Self {
            metadata,
            root,
            values,
            templates,
            crds,
            subcharts,
        })
    }

    /// Find a loaded subchart by its chart name
    pub fn subchart(&self, name: &str) -> Option<&LoadedChart> {
        self.subcharts.iter().find(|s| s.metadata.name == name)
    }

    /// Check that every enabled dependency is present with a matching version
    ///
    /// Returns [`CoreError::MissingDependencies`] listing each dependency
    /// that is absent from `charts/` or whose version does not satisfy the
    /// declared constraint.
    pub fn check_dependencies(&self) -> Result<()> {
        let mut missing = Vec::new();

        for dep in self.metadata.dependencies.iter().filter(|d| d.enabled) {
            let req = dep.version_req()?;
            let candidates: Vec<&LoadedChart> = self
                .subcharts
                .iter()
                .filter(|s| s.metadata.name == dep.name)
                .collect();

            let satisfied = candidates
                .iter()
                .any(|s| req.as_ref().is_none_or(|r| r.matches(&s.metadata.version)));
            if satisfied {
                continue;
            }

            match candidates.first() {
                Some(found) => missing.push(format!(
                    "{} ({} required, {} found)",
                    dep.name, dep.version, found.metadata.version
                )),
                None => missing.push(dep.name.clone()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::MissingDependencies {
                chart: self.metadata.name.clone(),
                missing,
            })
        }
    }
}

fn has_extension(path: &str, allowed: &[&str]) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| allowed.contains(&ext.as_str()))
}

fn utf8(data: &[u8], path: &str, invalid: &impl Fn(String) -> CoreError) -> Result<String> {
    String::from_utf8(data.to_vec()).map_err(|_| invalid(format!("{path} is not valid UTF-8")))
}

/// Custom serde for semver::Version
mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(s.trim_start_matches('v')).map_err(serde::de::Error::custom)
    }
}
