//! The chart reference document
//!
//! A document names one chart source and the value overlays to apply:
//!
//! ```yaml
//! apiVersion: p1.dsop.io/v1beta1
//! kind: HelmChart
//! metadata:
//!   name: mocha
//!   namespace: dog
//! chart:
//!   path: ./charts/mocha
//! valueFiles: [prod.yaml]
//! values:
//!   image:
//!     tag: latest
//! sopsValueFiles: [secrets.enc.yaml]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

pub const API_VERSION: &str = "p1.dsop.io/v1beta1";
pub const KIND: &str = "HelmChart";

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,

    /// Overrides `metadata.name` as the release name
    #[serde(default)]
    pub release_name: Option<String>,

    #[serde(default)]
    pub chart: ChartRef,

    #[serde(default)]
    pub value_files: Vec<String>,

    #[serde(default)]
    pub values: Option<InlineValues>,

    #[serde(default)]
    pub sops_value_files: Vec<String>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// The raw `chart` block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartRef {
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Inline values: a mapping or a raw YAML string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineValues {
    Map(serde_json::Map<String, serde_json::Value>),
    Raw(String),
}

/// Where the chart comes from, exactly one per document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartSource {
    /// A chart directory or `.tgz` on disk
    Local { path: PathBuf },
    /// A chart inside a git repository
    Git {
        url: String,
        reference: Option<String>,
        subpath: PathBuf,
    },
    /// A chart pulled from a chart repository
    Repository {
        url: String,
        name: String,
        version: Option<String>,
    },
}

impl std::fmt::Display for ChartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::Git {
                url,
                reference,
                subpath,
            } => {
                write!(f, "{url}")?;
                if let Some(r) = reference {
                    write!(f, "@{r}")?;
                }
                write!(f, "//{}", subpath.display())
            }
            Self::Repository { url, name, version } => {
                write!(f, "{url}/{name}")?;
                if let Some(v) = version {
                    write!(f, "@{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl ChartDocument {
    /// Read and validate a document; relative paths resolve against its directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::InvalidDocument {
            origin: path.display().to_string(),
            message: e.to_string(),
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_yaml(&content, &path.display().to_string(), base_dir)
    }

    /// Parse and validate a document from YAML text
    pub fn from_yaml(content: &str, origin: &str, base_dir: PathBuf) -> Result<Self> {
        let mut doc: ChartDocument =
            serde_yaml::from_str(content).map_err(|e| CoreError::InvalidDocument {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        doc.base_dir = base_dir;
        doc.validate(origin)?;
        Ok(doc)
    }

    fn validate(&self, origin: &str) -> Result<()> {
        let invalid = |message: String| CoreError::InvalidDocument {
            origin: origin.to_string(),
            message,
        };

        if self.api_version != API_VERSION {
            return Err(invalid(format!(
                "unsupported apiVersion '{}', expected '{API_VERSION}'",
                self.api_version
            )));
        }
        if self.kind != KIND {
            return Err(invalid(format!(
                "unsupported kind '{}', expected '{KIND}'",
                self.kind
            )));
        }
        if self.release_name().trim().is_empty() {
            return Err(invalid("metadata.name is required".to_string()));
        }

        // Surface source errors at load time rather than at resolution
        self.chart_source_for(origin).map(|_| ())
    }

    /// Release name: `releaseName` when set, else `metadata.name`
    pub fn release_name(&self) -> &str {
        self.release_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.metadata.name)
    }

    pub fn namespace(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Value files in document order, resolved against the document directory
    pub fn value_files(&self) -> Vec<PathBuf> {
        self.value_files.iter().map(|f| self.resolve_path(f)).collect()
    }

    /// Encrypted value files in document order, resolved against the document directory
    pub fn sops_value_files(&self) -> Vec<PathBuf> {
        self.sops_value_files
            .iter()
            .map(|f| self.resolve_path(f))
            .collect()
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// The single chart source named by the `chart` block
    pub fn chart_source(&self) -> Result<ChartSource> {
        self.chart_source_for("document")
    }

    fn chart_source_for(&self, origin: &str) -> Result<ChartSource> {
        let invalid = |message: &str| CoreError::InvalidDocument {
            origin: origin.to_string(),
            message: message.to_string(),
        };
        let chart = &self.chart;
        match (non_empty(&chart.git), non_empty(&chart.repository)) {
            (Some(_), Some(_)) => Err(invalid("chart.git and chart.repository are mutually exclusive")),
            (Some(url), None) => {
                if non_empty(&chart.name).is_some() || non_empty(&chart.version).is_some() {
                    return Err(invalid(
                        "chart.name and chart.version only apply to chart.repository",
                    ));
                }
                let subpath = PathBuf::from(non_empty(&chart.path).unwrap_or("."));
                if subpath.is_absolute() {
                    return Err(invalid("chart.path must be relative to the git repository"));
                }
                Ok(ChartSource::Git {
                    url: url.to_string(),
                    reference: non_empty(&chart.reference).map(String::from),
                    subpath,
                })
            }
            (None, Some(url)) => {
                if non_empty(&chart.path).is_some() || non_empty(&chart.reference).is_some() {
                    return Err(invalid(
                        "chart.path and chart.ref cannot be combined with chart.repository",
                    ));
                }
                let name = non_empty(&chart.name)
                    .ok_or_else(|| invalid("chart.name is required with chart.repository"))?;
                Ok(ChartSource::Repository {
                    url: url.to_string(),
                    name: name.to_string(),
                    version: non_empty(&chart.version).map(String::from),
                })
            }
            (None, None) => {
                if non_empty(&chart.reference).is_some() {
                    return Err(invalid("chart.ref requires chart.git"));
                }
                if non_empty(&chart.name).is_some() || non_empty(&chart.version).is_some() {
                    return Err(invalid("chart.name and chart.version require chart.repository"));
                }
                let path = non_empty(&chart.path).ok_or_else(|| {
                    invalid("chart must set one of chart.path, chart.git or chart.repository")
                })?;
                Ok(ChartSource::Local {
                    path: self.resolve_path(path),
                })
            }
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
