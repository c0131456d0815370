//! The dependency graph container.
//!
//! Insertion-ordered so that iteration, serialization, and emission are
//! deterministic for a given build. Cycles are ordinary edges here; the
//! runtime's lazy module binding makes them executable, so nothing in the
//! container rejects or breaks them.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::error::GraphError;
use crate::module::{ModuleId, ModuleRecord};

/// Finished build graph: every discovered module, fully transformed, plus
/// the entry points that seeded discovery.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    modules: IndexMap<ModuleId, ModuleRecord>,
    entries: Vec<(String, ModuleId)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry point. Order is the config's declaration order.
    pub(crate) fn push_entry(&mut self, name: String, id: ModuleId) {
        self.entries.push((name, id));
    }

    /// Insert a finished record. First insertion wins; a module reached by
    /// several importers is stored once.
    pub(crate) fn insert(&mut self, record: ModuleRecord) {
        self.modules.entry(record.id.clone()).or_insert(record);
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All records in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    /// Entry points in declaration order.
    pub fn entries(&self) -> &[(String, ModuleId)] {
        &self.entries
    }

    /// Every module reachable from `entry`, dependencies before dependents
    /// where the edges allow it. Iterative post-order DFS; back edges of a
    /// cycle are skipped rather than followed, so each member appears once
    /// and the order stays deterministic.
    pub fn post_order(&self, entry: &ModuleId) -> Result<Vec<&ModuleRecord>, GraphError> {
        let mut order = Vec::new();
        let mut finished: FxHashSet<ModuleId> = FxHashSet::default();
        let mut on_stack: FxHashSet<ModuleId> = FxHashSet::default();
        // (module, next dependency index) frames.
        let mut stack: Vec<(&ModuleRecord, usize)> = Vec::new();

        let root = self.lookup(None, entry)?;
        stack.push((root, 0));
        on_stack.insert(root.id.clone());

        while let Some(&(record, next)) = stack.last() {
            match record.resolved.get(next) {
                Some((_, dep)) => {
                    stack.last_mut().expect("frame present").1 += 1;
                    if finished.contains(dep) || on_stack.contains(dep) {
                        continue;
                    }
                    let child = self.lookup(Some(&record.id), dep)?;
                    on_stack.insert(child.id.clone());
                    stack.push((child, 0));
                }
                None => {
                    stack.pop();
                    on_stack.remove(&record.id);
                    finished.insert(record.id.clone());
                    order.push(record);
                }
            }
        }
        Ok(order)
    }

    /// Verify the closure invariant: every resolved edge points at a record
    /// present in the graph.
    pub fn verify_closure(&self) -> Result<(), GraphError> {
        for record in self.modules.values() {
            for (_, dep) in &record.resolved {
                if !self.modules.contains_key(dep) {
                    return Err(GraphError::BrokenClosure {
                        from: record.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn lookup(
        &self,
        from: Option<&ModuleId>,
        id: &ModuleId,
    ) -> Result<&ModuleRecord, GraphError> {
        self.modules.get(id).ok_or_else(|| GraphError::BrokenClosure {
            from: from.cloned().unwrap_or_else(|| id.clone()),
            dependency: id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleKind;
    use std::path::PathBuf;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(PathBuf::from(format!("/src/{name}.js")))
    }

    fn record(name: &str, deps: &[&str]) -> ModuleRecord {
        let mut rec = ModuleRecord::new(
            id(name),
            ModuleKind::Script,
            Vec::new(),
            format!("// {name}"),
        );
        for dep in deps {
            rec.resolved.push((format!("./{dep}"), id(dep)));
        }
        rec
    }

    fn names(order: &[&ModuleRecord]) -> Vec<String> {
        order
            .iter()
            .map(|r| {
                r.id.path()
                    .file_stem()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[test]
    fn post_order_puts_dependencies_first() {
        let mut graph = DependencyGraph::new();
        graph.insert(record("index", &["a", "b"]));
        graph.insert(record("a", &[]));
        graph.insert(record("b", &["a"]));

        let order = graph.post_order(&id("index")).unwrap();
        assert_eq!(names(&order), vec!["a", "b", "index"]);
    }

    #[test]
    fn diamond_appears_once() {
        let mut graph = DependencyGraph::new();
        graph.insert(record("index", &["left", "right"]));
        graph.insert(record("left", &["shared"]));
        graph.insert(record("right", &["shared"]));
        graph.insert(record("shared", &[]));

        let order = graph.post_order(&id("index")).unwrap();
        assert_eq!(names(&order), vec!["shared", "left", "right", "index"]);
    }

    #[test]
    fn cycle_members_each_appear_once() {
        let mut graph = DependencyGraph::new();
        graph.insert(record("index", &["a"]));
        graph.insert(record("a", &["b"]));
        graph.insert(record("b", &["a"]));

        let order = graph.post_order(&id("index")).unwrap();
        assert_eq!(names(&order), vec!["b", "a", "index"]);
    }

    #[test]
    fn closure_violation_is_reported() {
        let mut graph = DependencyGraph::new();
        graph.insert(record("index", &["ghost"]));
        assert!(matches!(
            graph.verify_closure(),
            Err(GraphError::BrokenClosure { .. })
        ));
        assert!(matches!(
            graph.post_order(&id("index")),
            Err(GraphError::BrokenClosure { .. })
        ));
    }

    #[test]
    fn insertion_order_is_iteration_order() {
        let mut graph = DependencyGraph::new();
        graph.insert(record("z", &[]));
        graph.insert(record("a", &[]));
        let order: Vec<_> = graph.modules().collect();
        assert_eq!(names(&order), vec!["z", "a"]);
    }
}
