//! Error types for configuration validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Schema validation errors (no filesystem checks)
    #[error("no entries specified")]
    NoEntries,

    #[error("duplicate entry name: {0}")]
    DuplicateEntry(String),

    #[error("invalid transform rule pattern `{pattern}`: {message}")]
    InvalidRulePattern { pattern: String, message: String },

    #[error("output filename pattern `{0}` contains no `[hash]` token")]
    MissingHashToken(String),

    #[error("output filename pattern `{0}` needs a `[name]` token for multi-entry builds")]
    MissingNameToken(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    // Filesystem validation errors (pre-flight, for callers that want them)
    #[error("entry path not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("resolve root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("HTML template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
