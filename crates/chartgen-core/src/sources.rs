//! Value sources
//!
//! Each source yields one value fragment: the chart's defaults, a plain
//! values file, the document's inline values, or a sops-encrypted file.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::chart::LoadedChart;
use crate::document::InlineValues;
use crate::error::CoreError;
use crate::values::Values;

#[derive(Error, Debug)]
pub enum ValueSourceError {
    #[error("Values file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read values file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse values from {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("Failed to decrypt {}: {message}", .path.display())]
    Decryption { path: PathBuf, message: String },
}

/// Decrypts an encrypted values file into plaintext YAML
pub trait Decryptor {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ValueSourceError>;
}

/// Shells out to the `sops` binary
#[derive(Debug, Clone)]
pub struct SopsDecryptor {
    binary: PathBuf,
}

impl Default for SopsDecryptor {
    fn default() -> Self {
        Self::new("sops")
    }
}

impl SopsDecryptor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Decryptor for SopsDecryptor {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ValueSourceError> {
        let decryption = |message: String| ValueSourceError::Decryption {
            path: path.to_path_buf(),
            message,
        };

        let output = Command::new(&self.binary)
            .args(["--decrypt", "--input-type", "yaml", "--output-type", "yaml"])
            .arg(path)
            .output()
            .map_err(|e| decryption(format!("failed to run {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(path = %path.display(), stderr = %stderr.trim(), "sops failed");
            let mut message = one_line(&stderr);
            if message.is_empty() {
                message = format!("{} exited with {}", self.binary.display(), output.status);
            }
            return Err(decryption(message));
        }

        Ok(output.stdout)
    }
}

/// Fold multi-line tool output into a single diagnostic line
fn one_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reads value fragments from every supported source
#[derive(Debug, Clone, Default)]
pub struct ValueSourceReader<D = SopsDecryptor> {
    decryptor: D,
}

impl<D: Decryptor> ValueSourceReader<D> {
    pub fn new(decryptor: D) -> Self {
        Self { decryptor }
    }

    /// The chart's default values, unmodified
    pub fn read_chart_defaults(&self, chart: &LoadedChart) -> Values {
        chart.values.clone()
    }

    pub fn read_values_file(&self, path: &Path) -> Result<Values, ValueSourceError> {
        let content = std::fs::read(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ValueSourceError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ValueSourceError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        parse_fragment(&content, &path.display().to_string())
    }

    /// Inline values, either already a mapping or raw YAML text
    pub fn read_inline_values(&self, raw: &InlineValues) -> Result<Values, ValueSourceError> {
        match raw {
            InlineValues::Map(map) => Ok(Values::from_map(map.clone())),
            InlineValues::Raw(text) => parse_fragment(text.as_bytes(), "inline values"),
        }
    }

    /// Decrypt then parse; decryption and parse failures stay distinct
    pub fn read_encrypted_values_file(&self, path: &Path) -> Result<Values, ValueSourceError> {
        if !path.exists() {
            return Err(ValueSourceError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let plaintext = self.decryptor.decrypt(path)?;
        parse_fragment(&plaintext, &path.display().to_string())
    }
}

fn parse_fragment(content: &[u8], origin: &str) -> Result<Values, ValueSourceError> {
    let parse = |message: String| ValueSourceError::Parse {
        origin: origin.to_string(),
        message,
    };

    let text = std::str::from_utf8(content).map_err(|e| parse(e.to_string()))?;
    Values::from_yaml(text).map_err(|e| match e {
        CoreError::YamlParse(inner) => parse(inner.to_string()),
        other => parse(other.to_string()),
    })
}
