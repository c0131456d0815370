//! Module resolution, transformation, and dependency graph construction.
//!
//! This crate turns a set of entry points into a closed [`DependencyGraph`]:
//! specifiers are resolved against the filesystem by [`AssetResolver`],
//! content is rewritten by the [`TransformPipeline`] (ESM lowering,
//! stylesheet extraction, binary asset passthrough), and [`GraphBuilder`]
//! drives parallel wave-based discovery with deterministic results.
//!
//! The graph is a value: once built it is immutable, insertion-ordered, and
//! safe to hand to emission. Cycles are retained as ordinary edges.

pub mod builder;
pub mod cancel;
pub mod error;
pub mod graph;
pub mod module;
pub mod resolver;
pub mod transform;

pub use builder::GraphBuilder;
pub use cancel::CancelToken;
pub use error::{GraphError, ResolveError, TransformError};
pub use graph::DependencyGraph;
pub use module::{ModuleId, ModuleKind, ModuleRecord, SideAsset, SideAssetKind};
pub use resolver::AssetResolver;
pub use transform::{LineMapping, SourceMap, TransformOutput, TransformPipeline};
