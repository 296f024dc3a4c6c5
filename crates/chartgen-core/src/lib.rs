//! chartgen core - chart model and value resolution
//!
//! - `Values`: value trees with right-biased deep merge
//! - `ValueSourceReader`: value fragments from files, inline maps and sops
//! - `ValueResolver`: the fixed-precedence resolution pipeline
//! - `LoadedChart`: charts loaded from directories or archives
//! - `ChartDocument`: the chart reference document and its `ChartSource`

pub mod archive;
pub mod chart;
pub mod context;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod release;
pub mod sources;
pub mod values;

pub use chart::{ChartFile, ChartKind, ChartMetadata, Dependency, EngineConfig, LoadedChart};
pub use context::TemplateContext;
pub use document::{ChartDocument, ChartSource, InlineValues};
pub use error::{CoreError, Result};
pub use pipeline::ValueResolver;
pub use release::ReleaseInfo;
pub use sources::{Decryptor, SopsDecryptor, ValueSourceError, ValueSourceReader};
pub use values::Values;
