//! Manifest assembly
//!
//! The final output is the primary manifest followed by every hook
//! manifest, joined with `\n---\n`.

use chartgen_core::{LoadedChart, ReleaseInfo, Values};

use crate::engine::Engine;
use crate::error::Result;

/// Separator placed between the primary manifest and each hook
pub const MANIFEST_SEPARATOR: &str = "\n---\n";

pub struct ManifestAssembler {
    engine: Engine,
}

impl Default for ManifestAssembler {
    fn default() -> Self {
        Self::new(Engine::new())
    }
}

impl ManifestAssembler {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Render `chart` as release `release` and assemble the output text
    pub fn assemble(
        &self,
        chart: &LoadedChart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<String> {
        let rendered = self.engine.render(chart, values, release)?;
        Ok(join_manifests(
            &rendered.manifest,
            rendered.hooks.iter().map(|h| h.manifest.as_str()),
        ))
    }
}

/// `primary`, then each hook in order, joined by [`MANIFEST_SEPARATOR`]
pub fn join_manifests<'a>(primary: &str, hooks: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = primary.to_string();
    for hook in hooks {
        out.push_str(MANIFEST_SEPARATOR);
        out.push_str(hook);
    }
    out
}
