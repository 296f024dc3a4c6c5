//! Chart acquisition for chartgen
//!
//! - Local chart directories and archives
//! - Shallow git clones into a temporary workspace
//! - Helm-style repositories, over HTTP or from a local directory
//! - One-shot repair of missing or outdated chart dependencies
//!
//! # Example
//!
//! ```no_run
//! use chartgen_core::ChartSource;
//! use chartgen_repo::{ChartResolver, ResolverOptions};
//!
//! let resolver = ChartResolver::new(ResolverOptions::default())?;
//! let chart = resolver.resolve(&ChartSource::Repository {
//!     url: "https://charts.bitnami.com/bitnami".to_string(),
//!     name: "redis".to_string(),
//!     version: Some("17.3.1".to_string()),
//! })?;
//! println!("{} {}", chart.metadata.name, chart.metadata.version);
//! # Ok::<(), chartgen_repo::RepoError>(())
//! ```

pub mod backend;
pub mod config;
pub mod dependency;
pub mod error;
pub mod git;
pub mod index;
pub mod resolver;

pub use backend::{FileBackend, HttpBackend, RepositoryBackend, create_backend, verify_digest};
pub use config::{Repository, RepositoryConfig, RepositoryType};
pub use dependency::{DependencyRepair, RepositoryRepair};
pub use error::{RepoError, Result};
pub use git::GitCloner;
pub use index::{ChartEntry, RepositoryIndex, VersionSpec};
pub use resolver::{ChartResolver, ResolverOptions};
