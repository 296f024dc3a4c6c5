//! Value trees with right-biased deep merge

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// A tree of configuration values
///
/// The root is always expected to be a mapping. Every source of values
/// (chart defaults, values files, inline values, decrypted files) produces
/// one `Values` fragment, and fragments are folded with [`Values::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Wrap an already materialized mapping
    pub fn from_map(map: serde_json::Map<String, JsonValue>) -> Self {
        Self(JsonValue::Object(map))
    }

    /// Parse a YAML document into a mapping
    ///
    /// A document with no content (blank or comments only) is the empty
    /// mapping. Any other non-mapping top level is rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if is_blank_document(yaml) {
            return Ok(Self::new());
        }

        match serde_yaml::from_str::<JsonValue>(yaml)? {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(map) => Ok(Self::from_map(map)),
            other => Err(CoreError::NotAMapping {
                found: kind_name(&other).to_string(),
            }),
        }
    }

    /// Load values from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Deep merge `overlay` into `self`
    ///
    /// Rules:
    /// - Mapping over mapping: merged key by key, recursively
    /// - Anything else: overlay replaces base wholesale (scalars, sequences,
    ///   and mappings replaced by non-mappings or vice versa)
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Pure form of [`Values::merge`]: `self` is left untouched
    #[must_use]
    pub fn merged(&self, overlay: &Values) -> Values {
        let mut out = self.clone();
        out.merge(overlay);
        out
    }

    /// Fold fragments left to right, later fragments taking precedence
    pub fn merge_all<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Values>,
    {
        fragments.into_iter().fold(Values::new(), |mut acc, v| {
            acc.merge(&v);
            acc
        })
    }

    /// Get a value by dotted path (e.g., "image.tag")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |current, key| current.as_object()?.get(key))
    }

    /// Set a value by dotted path, creating intermediate mappings
    pub fn set(&mut self, path: &str, value: JsonValue) {
        let keys: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &keys, value);
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Values visible to a subchart rendered under `name`
    ///
    /// The subchart sees the parent's `<name>.*` mapping as its root, plus
    /// the parent's `global` mapping unchanged.
    pub fn scope_for_subchart(&self, name: &str) -> Values {
        let mut scoped = serde_json::Map::new();

        if let JsonValue::Object(parent) = &self.0 {
            if let Some(global) = parent.get("global") {
                scoped.insert("global".to_string(), global.clone());
            }
            if let Some(JsonValue::Object(own)) = parent.get(name) {
                scoped.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        Values::from_map(scoped)
    }

    /// Subchart defaults overridden by the parent's scoped values
    pub fn for_subchart(subchart_defaults: &Values, parent: &Values, name: &str) -> Values {
        subchart_defaults.merged(&parent.scope_for_subchart(name))
    }
}

fn is_blank_document(yaml: &str) -> bool {
    yaml.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Non-mapping values along `path` are replaced by mappings
fn set_nested(target: &mut JsonValue, path: &[&str], value: JsonValue) {
    let Some((key, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = JsonValue::Object(serde_json::Map::new());
    }
    if let JsonValue::Object(map) = target {
        let entry = map.entry(key.to_string()).or_insert(JsonValue::Null);
        set_nested(entry, rest, value);
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    // Non-mapping collisions fall through to the replace arm below
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
