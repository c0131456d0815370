//! Transform rule declarations.
//!
//! Rules are matched against a module's path in declaration order and the
//! first matching rule wins. A rule whose `exclude` pattern also matches is
//! skipped, letting later rules act as fallbacks. This mirrors rule-list
//! semantics where a narrow exclusion is declared before a broader pattern.

use serde::{Deserialize, Serialize};

/// One declared transform rule: a filename pattern plus the transform to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRule {
    /// Regex matched against the module's path (e.g. `r"\.css$"`).
    pub test: String,

    /// Optional regex that vetoes this rule (e.g. `"node_modules"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Transform kind applied when the rule matches.
    pub kind: TransformKind,
}

impl TransformRule {
    /// Create a rule from a test pattern and transform kind.
    pub fn new(test: impl Into<String>, kind: TransformKind) -> Self {
        Self {
            test: test.into(),
            exclude: None,
            kind,
        }
    }

    /// Attach an exclusion pattern to this rule.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }
}

/// The closed set of supported transforms.
///
/// Each variant is independently pluggable inside the pipeline; this is a
/// tagged enum rather than an open plugin protocol because third-party
/// extensibility is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformKind {
    /// Lower ES module syntax to the bundler's runtime calls, with a source map.
    Script,
    /// Capture stylesheet content as a side asset instead of executable code.
    Style(StyleOptions),
    /// Opaque binary passthrough; emission strategy chosen by size threshold.
    Asset,
}

impl TransformKind {
    /// Style transform with default options (runtime injection).
    pub fn style() -> Self {
        TransformKind::Style(StyleOptions::default())
    }
}

/// Options for the style-extraction transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleOptions {
    /// When true, emit the stylesheet as a standalone fingerprinted file and
    /// have the shim link it; when false, inject it at runtime from the bundle.
    #[serde(default)]
    pub extract: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self { extract: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_builder_sets_exclude() {
        let rule = TransformRule::new(r"\.js$", TransformKind::Script).exclude("node_modules");
        assert_eq!(rule.exclude.as_deref(), Some("node_modules"));
    }

    #[test]
    fn style_default_injects_at_runtime() {
        match TransformKind::style() {
            TransformKind::Style(opts) => assert!(!opts.extract),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn kind_round_trips_through_serde() {
        let rule = TransformRule::new(r"\.png$", TransformKind::Asset);
        let json = serde_json::to_string(&rule).unwrap();
        let back: TransformRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, TransformKind::Asset);
    }
}
