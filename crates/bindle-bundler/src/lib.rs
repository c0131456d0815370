//! # bindle-bundler
//!
//! Deterministic bundle emission and build orchestration on top of the
//! bindle graph foundation.
//!
//! A build takes an immutable [`BuildConfig`], discovers and transforms the
//! module graph in parallel, and writes a content-fingerprinted output tree
//! atomically. Identical inputs produce byte-identical outputs.
//!
//! ## Quick start
//!
//! ```no_run
//! use bindle_bundler::{Bundler, CancelToken};
//! use bindle_config::{BuildConfig, EmitPlugin, TransformKind, TransformRule};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuildConfig::builder("dist")
//!     .entry("index", "./src/index.js")
//!     .rule(TransformRule::new(r"\.js$", TransformKind::Script).exclude("node_modules"))
//!     .plugin(EmitPlugin::inject_html("public/index.html"))
//!     .root(".")
//!     .build();
//!
//! let result = Bundler::new(config)?.run(&CancelToken::new())?;
//! println!("wrote {} artifacts", result.artifacts.len());
//! # Ok(()) }
//! ```

pub mod emit;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "logging")]
pub mod logging;
pub mod orchestrator;

mod copy;
mod html;
mod runtime;
mod writer;

pub use emit::{Artifact, ArtifactKind, BuildResult, Emitter};
pub use error::{EmissionError, Error, Result};
pub use orchestrator::Bundler;

// Foundation types callers need alongside the bundler.
pub use bindle_config::{
    BuildConfig, BuildConfigBuilder, EmitPlugin, StyleOptions, TransformKind, TransformRule,
};
pub use bindle_graph::{
    CancelToken, DependencyGraph, GraphError, ModuleId, ModuleKind, ResolveError, TransformError,
};
