//! Release identity exposed to templates

use serde::{Deserialize, Serialize};

/// Release information for templates
///
/// Rendering is always a first install: there is no stored release history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub is_install: bool,
    pub is_upgrade: bool,
    /// Always "chartgen"
    pub service: String,
}

impl ReleaseInfo {
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: "chartgen".to_string(),
        }
    }
}
