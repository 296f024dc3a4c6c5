//! Generate command - resolve a chart document and render its manifests

use chartgen_core::{ChartDocument, ReleaseInfo, SopsDecryptor, ValueResolver, ValueSourceReader};
use chartgen_engine::ManifestAssembler;
use chartgen_repo::{ChartResolver, ResolverOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, Result};

/// External tools and configuration used while generating
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub git_binary: PathBuf,
    pub git_timeout: Duration,
    pub sops_binary: PathBuf,
    pub repository_config: Option<PathBuf>,
}

/// Render the manifests for the document at `file`
///
/// Stages run in order and the first failure ends the run: read the
/// document, acquire the chart, resolve values, render. `cancel` aborts
/// chart acquisition mid-flight and stops the run between stages.
pub fn run(file: &Path, options: &GenerateOptions, cancel: &CancellationToken) -> Result<String> {
    let document = ChartDocument::from_file(file).map_err(CliError::Input)?;
    let source = document.chart_source().map_err(CliError::Input)?;
    tracing::info!(
        release = %document.release_name(),
        namespace = %document.namespace(),
        chart = %source,
        "generating manifests"
    );

    let resolver = ChartResolver::new(ResolverOptions {
        git_binary: options.git_binary.clone(),
        git_timeout: options.git_timeout,
        repository_config: options.repository_config.clone(),
    })?
    .with_cancellation(cancel.clone());
    let chart = resolver.resolve(&source)?;
    checkpoint(cancel)?;
    tracing::info!(chart = %chart.metadata.name, version = %chart.metadata.version, "chart loaded");

    let reader = ValueSourceReader::new(SopsDecryptor::new(&options.sops_binary));
    let values = ValueResolver::new(reader).resolve_document(&chart, &document)?;
    checkpoint(cancel)?;

    let release = ReleaseInfo::for_install(document.release_name(), document.namespace());
    let output = ManifestAssembler::default().assemble(&chart, &values, &release)?;
    tracing::debug!(bytes = output.len(), "manifests assembled");
    checkpoint(cancel)?;

    Ok(output)
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    Ok(())
}
