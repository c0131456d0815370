//! Error types for resolution, transformation, and graph construction.
//!
//! These are structured values, not formatted text; rendering for a terminal
//! or log is the caller's concern. A component-local failure is never
//! swallowed: omitting a module would leave the graph with a dangling
//! reference, so everything here aborts the build.

use std::path::PathBuf;

use thiserror::Error;

use crate::module::ModuleId;

/// A specifier could not be mapped to exactly one file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve `{specifier}`{}", from_suffix(.from))]
    NotFound {
        specifier: String,
        /// Module the specifier was written in, when known.
        from: Option<PathBuf>,
        /// Candidate paths probed, in probe order.
        searched: Vec<PathBuf>,
    },

    #[error("ambiguous specifier `{specifier}`: {} candidates match equally", .candidates.len())]
    Ambiguous {
        specifier: String,
        candidates: Vec<PathBuf>,
    },

    #[error("I/O error resolving `{specifier}`: {source}")]
    Io {
        specifier: String,
        #[source]
        source: std::io::Error,
    },
}

fn from_suffix(from: &Option<PathBuf>) -> String {
    match from {
        Some(path) => format!(" from {}", path.display()),
        None => String::new(),
    }
}

/// Content could not be processed by its assigned transform.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{}:{line}:{column}: {message}", .file.display())]
    Syntax {
        file: PathBuf,
        /// 1-based line of the offending position.
        line: u32,
        /// 1-based column of the offending position.
        column: u32,
        message: String,
    },

    #[error("{} is not valid UTF-8 but matched a textual transform", .file.display())]
    NotUtf8 { file: PathBuf },

    #[error("invalid rule pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("unresolved reference in stylesheet {}: {source}", .file.display())]
    StyleReference {
        file: PathBuf,
        #[source]
        source: Box<ResolveError>,
    },

    #[error("I/O error transforming {}: {source}", .file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Graph construction failure, carrying the referencing context.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("entry `{name}` could not be resolved: {source}")]
    Entry {
        name: String,
        #[source]
        source: ResolveError,
    },

    #[error("unresolved import `{specifier}` in {from}: {source}")]
    Unresolved {
        from: ModuleId,
        specifier: String,
        #[source]
        source: ResolveError,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("module {from} references {dependency} which is missing from the graph")]
    BrokenClosure { from: ModuleId, dependency: ModuleId },

    #[error("content hash of {module} read before its transforms completed")]
    HashNotReady { module: ModuleId },

    #[error("I/O error reading {}: {source}", .file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build cancelled")]
    Cancelled,
}
