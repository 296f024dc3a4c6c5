//! Hook classification
//!
//! A rendered document is a hook when its `metadata.annotations` carry
//! `chartgen.io/hook` or the Helm-compatible `helm.sh/hook`. Hooks are
//! emitted after the primary manifest and never executed.

use serde_yaml::Value as YamlValue;

const HOOK_ANNOTATIONS: [&str; 2] = ["chartgen.io/hook", "helm.sh/hook"];
const WEIGHT_ANNOTATIONS: [&str; 2] = ["chartgen.io/hook-weight", "helm.sh/hook-weight"];

/// A rendered hook document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookManifest {
    /// `metadata.name` of the hook resource
    pub name: String,
    pub kind: String,
    /// Template the hook was rendered from
    pub source: String,
    /// Phases listed in the hook annotation, e.g. `post-install`
    pub phases: Vec<String>,
    pub weight: i32,
    /// Document text, without a leading separator
    pub manifest: String,
}

/// Hook metadata of a parsed document, `None` for ordinary resources
pub(crate) fn classify(doc: &YamlValue, source: &str, manifest: &str) -> Option<HookManifest> {
    let metadata = doc.get("metadata");
    let annotations = metadata.and_then(|m| m.get("annotations"))?;

    let phases = first_annotation(annotations, &HOOK_ANNOTATIONS)?
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    let weight = first_annotation(annotations, &WEIGHT_ANNOTATIONS)
        .and_then(|w| w.trim().parse().ok())
        .unwrap_or(0);

    Some(HookManifest {
        name: metadata
            .and_then(|m| m.get("name"))
            .and_then(YamlValue::as_str)
            .unwrap_or_default()
            .to_string(),
        kind: doc
            .get("kind")
            .and_then(YamlValue::as_str)
            .unwrap_or_default()
            .to_string(),
        source: source.to_string(),
        phases,
        weight,
        manifest: manifest.to_string(),
    })
}

fn first_annotation<'a>(annotations: &'a YamlValue, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| annotations.get(*key).and_then(YamlValue::as_str))
}
