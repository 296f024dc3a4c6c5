//! Value resolution pipeline
//!
//! Sources are folded lowest precedence first:
//!
//! 1. chart defaults
//! 2. each values file, in list order
//! 3. inline values
//! 4. each encrypted values file, in list order
//!
//! The first failing source aborts resolution.

use std::path::PathBuf;

use crate::chart::LoadedChart;
use crate::document::{ChartDocument, InlineValues};
use crate::sources::{Decryptor, SopsDecryptor, ValueSourceError, ValueSourceReader};
use crate::values::Values;

pub struct ValueResolver<D = SopsDecryptor> {
    reader: ValueSourceReader<D>,
}

impl<D: Decryptor> ValueResolver<D> {
    pub fn new(reader: ValueSourceReader<D>) -> Self {
        Self { reader }
    }

    pub fn resolve(
        &self,
        chart: &LoadedChart,
        value_files: &[PathBuf],
        inline: Option<&InlineValues>,
        encrypted_files: &[PathBuf],
    ) -> Result<Values, ValueSourceError> {
        let mut merged = self.reader.read_chart_defaults(chart);
        tracing::debug!(chart = %chart.metadata.name, "merged chart defaults");

        for path in value_files {
            merged.merge(&self.reader.read_values_file(path)?);
            tracing::debug!(file = %path.display(), "merged values file");
        }

        if let Some(inline) = inline {
            merged.merge(&self.reader.read_inline_values(inline)?);
            tracing::debug!("merged inline values");
        }

        for path in encrypted_files {
            merged.merge(&self.reader.read_encrypted_values_file(path)?);
            tracing::debug!(file = %path.display(), "merged encrypted values file");
        }

        Ok(merged)
    }

    /// Resolve every source a document names
    pub fn resolve_document(
        &self,
        chart: &LoadedChart,
        doc: &ChartDocument,
    ) -> Result<Values, ValueSourceError> {
        self.resolve(
            chart,
            &doc.value_files(),
            doc.values.as_ref(),
            &doc.sops_value_files(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartMetadata;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    /// Treats the file content itself as the plaintext
    struct Passthrough;

    impl Decryptor for Passthrough {
        fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ValueSourceError> {
            std::fs::read(path).map_err(|e| ValueSourceError::Decryption {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }

    fn chart(defaults: serde_json::Value) -> LoadedChart {
        let metadata: ChartMetadata =
            serde_yaml::from_str("apiVersion: v2\nname: demo\nversion: 0.1.0\n").unwrap();
        LoadedChart {
            metadata,
            root: None,
            values: Values(defaults),
            templates: vec![],
            crds: vec![],
            subcharts: vec![],
        }
    }

    fn resolver() -> ValueResolver<Passthrough> {
        ValueResolver::new(ValueSourceReader::new(Passthrough))
    }

    fn file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn inline(v: serde_json::Value) -> InlineValues {
        InlineValues::Map(v.as_object().unwrap().clone())
    }

    #[test]
    fn test_precedence_order() {
        let temp = TempDir::new().unwrap();
        let chart = chart(json!({"x": 1}));
        let files = [file(temp.path(), "f.yaml", "x: 2\n")];
        let inline = inline(json!({"x": 3}));
        let secrets = [file(temp.path(), "s.yaml", "x: 4\n")];
        let r = resolver();

        let all = r.resolve(&chart, &files, Some(&inline), &secrets).unwrap();
        assert_eq!(all.get("x").unwrap(), 4);

        let no_secrets = r.resolve(&chart, &files, Some(&inline), &[]).unwrap();
        assert_eq!(no_secrets.get("x").unwrap(), 3);

        let files_only = r.resolve(&chart, &files, None, &[]).unwrap();
        assert_eq!(files_only.get("x").unwrap(), 2);

        let defaults = r.resolve(&chart, &[], None, &[]).unwrap();
        assert_eq!(defaults.get("x").unwrap(), 1);
    }

    #[test]
    fn test_value_files_apply_in_list_order() {
        let temp = TempDir::new().unwrap();
        let a = file(temp.path(), "a.yaml", "x: a\nonly_a: true\n");
        let b = file(temp.path(), "b.yaml", "x: b\n");

        let merged = resolver()
            .resolve(&chart(json!({})), &[a.clone(), b.clone()], None, &[])
            .unwrap();
        assert_eq!(merged.get("x").unwrap(), "b");
        assert_eq!(merged.get("only_a").unwrap(), true);

        let merged = resolver().resolve(&chart(json!({})), &[b, a], None, &[]).unwrap();
        assert_eq!(merged.get("x").unwrap(), "a");
    }

    #[test]
    fn test_nested_override_keeps_siblings() {
        let chart = chart(json!({"image": {"repository": "rancher/rancher", "tag": "stable"}}));
        let inline = inline(json!({"image": {"tag": "latest"}}));

        let merged = resolver().resolve(&chart, &[], Some(&inline), &[]).unwrap();
        assert_eq!(merged.get("image.repository").unwrap(), "rancher/rancher");
        assert_eq!(merged.get("image.tag").unwrap(), "latest");
    }

    #[test]
    fn test_first_failure_aborts() {
        let temp = TempDir::new().unwrap();
        let good = file(temp.path(), "good.yaml", "x: 2\n");
        let missing = temp.path().join("missing.yaml");
        let bad_secret = file(temp.path(), "bad.yaml", "- not a map\n");

        let err = resolver()
            .resolve(&chart(json!({})), &[good.clone(), missing.clone()], None, &[bad_secret.clone()])
            .unwrap_err();
        assert!(matches!(err, ValueSourceError::FileNotFound { ref path } if *path == missing));

        let err = resolver()
            .resolve(&chart(json!({})), &[good], None, &[bad_secret])
            .unwrap_err();
        assert!(matches!(err, ValueSourceError::Parse { .. }));
    }

    #[test]
    fn test_chart_defaults_untouched() {
        let chart = chart(json!({"x": 1}));
        let inline = inline(json!({"x": 2}));

        resolver().resolve(&chart, &[], Some(&inline), &[]).unwrap();
        assert_eq!(chart.values.get("x").unwrap(), 1);
    }
}
