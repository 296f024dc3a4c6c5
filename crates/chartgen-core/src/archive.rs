//! In-memory chart archives
//!
//! Charts are distributed as gzipped tarballs whose entries live under a
//! single top-level directory named after the chart (`mychart/Chart.yaml`).
//! Archives are never unpacked to disk: [`read_archive`] returns the file
//! tree keyed by chart-relative path.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};

/// Chart-relative path to file content
pub type FileTree = BTreeMap<String, Vec<u8>>;

/// Read every regular file of a `.tgz` chart archive
///
/// The top-level directory is stripped unless the archive carries
/// `Chart.yaml` at its root. Entries escaping the archive root are skipped.
pub fn read_archive(bytes: &[u8], origin: &str) -> Result<FileTree> {
    let archive_err = |message: String| CoreError::Archive {
        origin: origin.to_string(),
        message,
    };

    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut raw = FileTree::new();

    let entries = archive
        .entries()
        .map_err(|e| archive_err(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_err(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(|e| archive_err(e.to_string()))?;
        let Some(key) = normalized_key(&path) else {
            tracing::warn!(origin, path = %path.display(), "skipping archive entry outside the chart root");
            continue;
        };

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| archive_err(e.to_string()))?;
        raw.insert(key, data);
    }

    if raw.is_empty() {
        return Err(archive_err("archive contains no files".to_string()));
    }

    if raw.contains_key("Chart.yaml") {
        return Ok(raw);
    }

    Ok(raw
        .into_iter()
        .filter_map(|(key, data)| {
            let (_, rest) = key.split_once('/')?;
            Some((rest.to_string(), data))
        })
        .collect())
}

/// Package a chart directory as a `.tgz` with entries under `prefix/`
pub fn create_archive(dir: &Path, prefix: &str) -> Result<Vec<u8>> {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut files: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in files {
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let Some(rel) = normalized_key(rel) else {
            continue;
        };
        let data = std::fs::read(entry.path())?;

        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, format!("{prefix}/{rel}"), data.as_slice())?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Forward-slash key for a relative path, `None` if it is absolute or uses `..`
fn normalized_key(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
