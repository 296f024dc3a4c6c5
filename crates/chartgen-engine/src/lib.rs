//! chartgen engine - Jinja2 templating for charts
//!
//! Renders a loaded chart with MiniJinja, splits the output into YAML
//! documents, separates hooks from the primary manifest, and assembles the
//! final output text.

pub mod assembler;
pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;
pub mod hooks;

pub use assembler::{ManifestAssembler, join_manifests};
pub use engine::{Engine, EngineBuilder, RenderResult};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use hooks::HookManifest;
