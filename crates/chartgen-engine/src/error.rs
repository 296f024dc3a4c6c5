//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("{source_path} did not render to valid YAML: {message}")]
    #[diagnostic(
        code(chartgen::template::invalid_yaml),
        help("check indentation around interpolated values; the `nindent` and `toyaml` filters help with nested blocks")
    )]
    InvalidManifest { source_path: String, message: String },
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    Other,
}

/// Template error carrying the template source and the failing line
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{template}: {message}")]
#[diagnostic(code(chartgen::template::render))]
pub struct TemplateError {
    pub message: String,
    pub kind: TemplateErrorKind,
    /// Chart-relative name of the failing template
    pub template: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    pub fn from_minijinja(err: &minijinja::Error, template: &str, source: &str) -> Self {
        let kind = categorize(err);
        let message = match err.detail() {
            Some(detail) => format!("{}: {detail}", describe(kind)),
            None => err.to_string(),
        };

        Self {
            message,
            kind,
            template: template.to_string(),
            src: NamedSource::new(template, source.to_string()),
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion: suggestion(kind, source, err.line()),
        }
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    use minijinja::ErrorKind;

    match err.kind() {
        ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        ErrorKind::NonPrimitive | ErrorKind::NonKey | ErrorKind::InvalidOperation => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

fn describe(kind: TemplateErrorKind) -> &'static str {
    match kind {
        TemplateErrorKind::UndefinedVariable => "undefined variable",
        TemplateErrorKind::UnknownFilter => "unknown filter",
        TemplateErrorKind::UnknownFunction => "unknown function",
        TemplateErrorKind::SyntaxError => "syntax error",
        TemplateErrorKind::TypeError => "invalid operation",
        TemplateErrorKind::Other => "render error",
    }
}

fn suggestion(kind: TemplateErrorKind, source: &str, line: Option<usize>) -> Option<String> {
    let text = line.and_then(|l| source.lines().nth(l.checked_sub(1)?))?;

    match kind {
        TemplateErrorKind::UndefinedVariable if text.contains(".Values") => Some(
            "templates use Jinja syntax: write `values.x` instead of `.Values.x`".to_string(),
        ),
        TemplateErrorKind::UndefinedVariable if text.contains("value.") => {
            Some("use `values` (plural) to access the values object".to_string())
        }
        TemplateErrorKind::UndefinedVariable => Some(
            "set the value in values.yaml or guard it with `| default(...)` or `is defined`"
                .to_string(),
        ),
        TemplateErrorKind::UnknownFilter if text.contains("toYaml") || text.contains("toJson") => {
            Some("filter names are lowercase: `toyaml`, `tojson`".to_string())
        }
        _ => None,
    }
}

/// Span covering the whole 1-based `line` of `source`
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let len = text.trim_end_matches(['\n', '\r']).len();
            return Some(SourceSpan::new(offset.into(), len));
        }
        offset += text.len();
    }
    None
}

pub type Result<T> = std::result::Result<T, EngineError>;
