//! Bundle runtime serialization.
//!
//! One payload per entry: a self-contained IIFE holding a module registry
//! keyed by root-relative path, a `__require` that caches the module object
//! *before* executing its factory (so cyclic imports observe partially
//! initialized exports instead of recursing forever), and a final call that
//! kicks off the entry module.
//!
//! Serialization is purely a fold over the post-order module list, so the
//! payload is byte-identical for identical graphs.

use std::collections::HashMap;

use bindle_graph::{LineMapping, ModuleId, ModuleRecord, SourceMap};

/// A serialized bundle and its assembled source map.
pub(crate) struct SerializedBundle {
    pub code: String,
    pub map: SourceMap,
}

const PREAMBLE: &[&str] = &[
    "(function () {",
    "\"use strict\";",
    "var __modules = {};",
    "var __cache = {};",
    "function __define(key, deps, factory) {",
    "  __modules[key] = { deps: deps, factory: factory };",
    "}",
    "function __require(key) {",
    "  var cached = __cache[key];",
    "  if (cached) { return cached.exports; }",
    "  var def = __modules[key];",
    "  if (!def) { throw new Error(\"missing module: \" + key); }",
    "  var module = { exports: {} };",
    "  __cache[key] = module;",
    "  def.factory(__scoped(def.deps), module, module.exports);",
    "  return module.exports;",
    "}",
    "function __scoped(deps) {",
    "  return function (specifier) {",
    "    var key = deps[specifier];",
    "    if (key === undefined) { throw new Error(\"unresolved specifier: \" + specifier); }",
    "    return __require(key);",
    "  };",
    "}",
];

/// Serialize one entry's modules, dependencies-first.
pub(crate) fn serialize(
    entry_key: &str,
    modules: &[(String, &ModuleRecord)],
    keys: &HashMap<ModuleId, String>,
) -> SerializedBundle {
    let mut w = Writer::new();
    for line in PREAMBLE {
        w.line(line);
    }
    for (key, record) in modules {
        w.line(&format!(
            "__define({}, {}, function (require, module, exports) {{",
            js_string(key),
            deps_json(record, keys)
        ));
        w.module_body(record);
        w.line("});");
    }
    w.line(&format!("__require({});", js_string(entry_key)));
    w.line("})();");
    SerializedBundle {
        code: w.code,
        map: w.map,
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).expect("string serializes")
}

/// Specifier -> registry key map, in the module's resolution order.
fn deps_json(record: &ModuleRecord, keys: &HashMap<ModuleId, String>) -> String {
    let pairs: Vec<String> = record
        .resolved
        .iter()
        .filter_map(|(spec, id)| {
            keys.get(id)
                .map(|key| format!("{}: {}", js_string(spec), js_string(key)))
        })
        .collect();
    format!("{{ {} }}", pairs.join(", "))
}

struct Writer {
    code: String,
    map: SourceMap,
}

impl Writer {
    fn new() -> Self {
        Self {
            code: String::new(),
            map: SourceMap {
                sources: Vec::new(),
                mappings: Vec::new(),
            },
        }
    }

    /// Append one runtime line with no original counterpart.
    fn line(&mut self, text: &str) {
        self.code.push_str(text);
        self.code.push('\n');
        self.map.push_synthetic();
    }

    /// Append a module's content, carrying its per-line mappings into the
    /// bundle map with source indices re-based.
    fn module_body(&mut self, record: &ModuleRecord) {
        let remap: Vec<u32> = match &record.source_map {
            Some(map) => map
                .sources
                .iter()
                .map(|src| self.intern_source(src))
                .collect(),
            None => Vec::new(),
        };
        for (i, line) in record.content.lines().enumerate() {
            self.code.push_str(line);
            self.code.push('\n');
            let mapping = record
                .source_map
                .as_ref()
                .and_then(|map| map.mappings.get(i).copied().flatten())
                .map(|m| LineMapping {
                    source: remap[m.source as usize],
                    line: m.line,
                });
            self.map.mappings.push(mapping);
        }
    }

    fn intern_source(&mut self, source: &str) -> u32 {
        if let Some(idx) = self.map.sources.iter().position(|s| s == source) {
            return idx as u32;
        }
        self.map.sources.push(source.to_string());
        (self.map.sources.len() - 1) as u32
    }
}
