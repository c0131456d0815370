//! Parallel dependency graph construction.
//!
//! Discovery runs in waves. Each wave's frontier holds modules that have been
//! claimed in the visited set but not yet processed; workers read, transform,
//! scan, and resolve them in parallel, and a sequential merge folds the
//! results into the graph in frontier order. Claiming happens under one lock
//! as an atomic check-and-insert, so a module reached along several paths in
//! the same wave is still transformed exactly once.
//!
//! Determinism falls out of the merge: worker completion order never touches
//! the graph. Results are folded in frontier order, the next frontier is the
//! dependencies in that same order, and when several workers fail, the error
//! reported is the first in frontier order.

use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info_span};

use crate::cancel::CancelToken;
use crate::error::GraphError;
use crate::graph::DependencyGraph;
use crate::module::{ModuleId, ModuleKind, ModuleRecord};
use crate::resolver::AssetResolver;
use crate::transform::TransformPipeline;

/// Builds a [`DependencyGraph`] by breadth-first discovery from the entry
/// points.
pub struct GraphBuilder {
    resolver: AssetResolver,
    pipeline: TransformPipeline,
}

impl GraphBuilder {
    pub fn new(resolver: AssetResolver, pipeline: TransformPipeline) -> Self {
        Self { resolver, pipeline }
    }

    /// Discover and transform every module reachable from `entries`.
    ///
    /// The returned graph is closed: every resolved edge points at a record
    /// in it. Cancellation is observed between waves; the wave in flight
    /// completes first.
    pub fn build(
        &self,
        entries: &IndexMap<String, PathBuf>,
        cancel: &CancelToken,
    ) -> Result<DependencyGraph, GraphError> {
        let span = info_span!("graph_build", entries = entries.len());
        let _guard = span.enter();

        let mut graph = DependencyGraph::new();
        let visited: Mutex<FxHashSet<ModuleId>> = Mutex::new(FxHashSet::default());
        let mut frontier: Vec<ModuleId> = Vec::new();

        for (name, path) in entries {
            let specifier = path.to_string_lossy();
            let id = self
                .resolver
                .resolve(None, &specifier)
                .map_err(|source| GraphError::Entry {
                    name: name.clone(),
                    source,
                })?;
            graph.push_entry(name.clone(), id.clone());
            // Two entries may name the same file; it is discovered once.
            if visited.lock().insert(id.clone()) {
                frontier.push(id);
            }
        }

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
            debug!(wave_size = frontier.len(), "processing discovery wave");

            let results: Vec<Result<ModuleRecord, GraphError>> = frontier
                .par_iter()
                .map(|id| self.process(id))
                .collect();

            let mut next = Vec::new();
            for result in results {
                let record = result?;
                record.seal_hash();
                for (_, dep) in &record.resolved {
                    if visited.lock().insert(dep.clone()) {
                        next.push(dep.clone());
                    }
                }
                graph.insert(record);
            }
            frontier = next;
        }

        graph.verify_closure()?;
        debug!(
            modules = graph.len(),
            transforms = self.pipeline.transforms_applied(),
            "graph complete"
        );
        Ok(graph)
    }

    /// Read, transform, scan, and resolve one module. Pure over the
    /// filesystem snapshot; safe to run concurrently with other modules.
    fn process(&self, id: &ModuleId) -> Result<ModuleRecord, GraphError> {
        let raw = fs::read(id.path()).map_err(|source| GraphError::Io {
            file: id.path().to_path_buf(),
            source,
        })?;
        let output = self.pipeline.apply(id, &raw)?;

        let mut record = ModuleRecord::new(id.clone(), output.kind, raw, output.content);
        record.side_assets = output.side_assets;
        record.source_map = output.source_map;

        // Only executable script output carries dependency calls. Excluded
        // trees are opaque: the module is a leaf regardless of its content.
        if record.kind == ModuleKind::Script && !self.resolver.is_opaque(id) {
            record.specifiers = self.pipeline.scan_requires(&record.content, id.path())?;
            for specifier in &record.specifiers {
                let dep = self
                    .resolver
                    .resolve(Some(id), specifier)
                    .map_err(|source| GraphError::Unresolved {
                        from: id.clone(),
                        specifier: specifier.clone(),
                        source,
                    })?;
                record.resolved.push((specifier.clone(), dep));
            }
        }
        Ok(record)
    }
}
