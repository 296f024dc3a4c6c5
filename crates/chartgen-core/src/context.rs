//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chart::ChartMetadata;
use crate::release::ReleaseInfo;
use crate::values::Values;

/// Context available to all templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Final merged values
    pub values: JsonValue,
    pub release: ReleaseInfo,
    pub chart: ChartInfo,
    pub capabilities: Capabilities,
}

/// Chart information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: Option<String>,
    pub description: Option<String>,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(meta: &ChartMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version.to_string(),
            app_version: meta.app_version.clone(),
            description: meta.description.clone(),
        }
    }
}

/// Cluster capabilities
///
/// Nothing is ever discovered from a cluster; these are fixed defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub kube_version: KubeVersion,
    pub api_versions: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            kube_version: KubeVersion::default(),
            api_versions: [
                "v1",
                "apps/v1",
                "batch/v1",
                "networking.k8s.io/v1",
                "policy/v1",
                "rbac.authorization.k8s.io/v1",
                "autoscaling/v2",
                "apiextensions.k8s.io/v1",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Kubernetes version info
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeVersion {
    pub version: String,
    pub major: String,
    pub minor: String,
}

impl Default for KubeVersion {
    fn default() -> Self {
        Self {
            version: "v1.28.0".to_string(),
            major: "1".to_string(),
            minor: "28".to_string(),
        }
    }
}

impl TemplateContext {
    pub fn new(values: &Values, release: &ReleaseInfo, chart: &ChartMetadata) -> Self {
        Self {
            values: values.inner().clone(),
            release: release.clone(),
            chart: ChartInfo::from(chart),
            capabilities: Capabilities::default(),
        }
    }

    /// Convert to minijinja-compatible context
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
