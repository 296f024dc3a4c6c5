//! CLI error type
//!
//! Each variant names the stage that failed and wraps that stage's error
//! unchanged.

use chartgen_core::{CoreError, ValueSourceError};
use chartgen_engine::EngineError;
use chartgen_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The chart reference document is unreadable or invalid
    #[error("{0}")]
    #[diagnostic(code(chartgen::cli::input))]
    Input(#[source] CoreError),

    #[error("Cannot acquire chart: {0}")]
    #[diagnostic(
        code(chartgen::cli::chart),
        help("check chart.path, chart.git or chart.repository in the document")
    )]
    ChartAcquisition(#[source] RepoError),

    #[error("Cannot resolve values: {0}")]
    #[diagnostic(code(chartgen::cli::values))]
    ValueSource(#[from] ValueSourceError),

    #[error("Cannot render chart: {0}")]
    #[diagnostic(code(chartgen::cli::render))]
    Render(#[from] EngineError),

    #[error("Cannot write output: {0}")]
    #[diagnostic(code(chartgen::cli::output))]
    Output(#[from] std::io::Error),

    #[error("Interrupted")]
    #[diagnostic(code(chartgen::cli::interrupted))]
    Interrupted,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_)
            | CliError::ChartAcquisition(_)
            | CliError::ValueSource(_)
            | CliError::Render(_)
            | CliError::Output(_)
            | CliError::Interrupted => exit_codes::GENERATE_ERROR,
        }
    }

    /// Full diagnostic with source snippet, when the error carries one
    pub fn report(self) -> miette::Report {
        match self {
            CliError::Render(EngineError::Template(e)) => miette::Report::new(e),
            other => miette::Report::new(other),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        CliError::ChartAcquisition(err)
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prefixes() {
        let err = CliError::from(RepoError::Cancelled);
        assert_eq!(err.to_string(), "Cannot acquire chart: Operation cancelled");
        assert_eq!(err.exit_code(), exit_codes::GENERATE_ERROR);

        let err = CliError::from(ValueSourceError::FileNotFound {
            path: "values.yaml".into(),
        });
        assert!(err.to_string().starts_with("Cannot resolve values: "));

        assert_eq!(CliError::Interrupted.exit_code(), exit_codes::GENERATE_ERROR);
    }

    #[test]
    fn test_input_error_is_unchanged() {
        let inner = CoreError::InvalidDocument {
            origin: "doc.yaml".to_string(),
            message: "unsupported kind 'Kustomization', expected 'HelmChart'".to_string(),
        };
        let expected = inner.to_string();
        let err = CliError::Input(inner);
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.exit_code(), exit_codes::GENERATE_ERROR);
    }
}
