//! Bundler error taxonomy.
//!
//! Component crates carry their own structured errors; this crate adds the
//! emission failures and a top-level [`Error`] that wraps everything a build
//! can surface. All variants are `miette` diagnostics so callers get coded,
//! render-ready reports without this crate formatting anything itself.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Artifact emission failure. Raised while computing or writing output;
/// always before a partial tree could be presented as a successful build.
#[derive(Debug, Error, Diagnostic)]
pub enum EmissionError {
    #[error("static copy source '{}' does not exist", .path.display())]
    #[diagnostic(
        code(bindle::emit::copy_source_missing),
        help("check the `from` path of the copy-static plugin")
    )]
    CopySourceMissing { path: PathBuf },

    #[error("no artifact is registered under the logical name `{name}`")]
    #[diagnostic(code(bindle::emit::unknown_logical_name))]
    UnknownLogicalName { name: String },

    #[error("failed to render template '{}': {message}", .template.display())]
    #[diagnostic(code(bindle::emit::template_render))]
    TemplateRender { template: PathBuf, message: String },

    #[error("artifact path `{filename}` escapes the output directory")]
    #[diagnostic(code(bindle::emit::output_escape))]
    OutputEscape { filename: String },

    #[error("I/O error on '{}': {source}", .path.display())]
    #[diagnostic(code(bindle::emit::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure a build can end with. Exactly one terminal result per build:
/// a [`crate::BuildResult`] or one of these.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(code(bindle::config))]
    Config(#[from] bindle_config::ConfigError),

    #[error(transparent)]
    #[diagnostic(code(bindle::resolve))]
    Resolve(#[from] bindle_graph::ResolveError),

    #[error(transparent)]
    #[diagnostic(code(bindle::transform))]
    Transform(#[from] bindle_graph::TransformError),

    #[error(transparent)]
    #[diagnostic(code(bindle::graph))]
    Graph(#[from] bindle_graph::GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Emission(#[from] EmissionError),

    #[error("build cancelled")]
    #[diagnostic(code(bindle::cancelled))]
    Cancelled,
}

impl Error {
    /// Lift a graph failure, separating cancellation from real errors.
    pub(crate) fn from_graph(err: bindle_graph::GraphError) -> Self {
        match err {
            bindle_graph::GraphError::Cancelled => Error::Cancelled,
            other => Error::Graph(other),
        }
    }
}

/// Result alias used throughout the bundler.
pub type Result<T> = std::result::Result<T, Error>;
