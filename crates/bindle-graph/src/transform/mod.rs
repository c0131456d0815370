//! Content transformation.
//!
//! A module's raw bytes pass through at most one transform, selected by the
//! first configured rule whose pattern matches the module path (an `exclude`
//! pattern on the rule vetoes the match). Unmatched modules are carried
//! through verbatim and never scanned for dependencies.
//!
//! After transformation every executable module speaks one dialect:
//! `require("...")` calls and `module.exports`/`exports.*` assignments.
//! Dependency discovery scans that dialect, so it sees exactly what the
//! runtime will execute.

mod asset;
mod lexer;
mod script;
mod sourcemap;
mod style;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use bindle_config::{BuildConfig, TransformKind, TransformRule};
use regex::Regex;
use tracing::debug;

use crate::error::TransformError;
use crate::module::{ModuleId, ModuleKind, SideAsset};
use crate::resolver::AssetResolver;

pub use sourcemap::{LineMapping, SourceMap};

/// Result of transforming one module's raw bytes.
#[derive(Debug)]
pub struct TransformOutput {
    pub kind: ModuleKind,
    /// Transformed module text.
    pub content: String,
    pub source_map: Option<SourceMap>,
    /// Extracted stylesheets and emitted binaries, already fingerprinted.
    pub side_assets: Vec<SideAsset>,
}

struct CompiledRule {
    test: Regex,
    exclude: Option<Regex>,
    kind: TransformKind,
}

/// Applies configured transform rules to module content.
///
/// Stateless across modules apart from an applied-transform counter, so it is
/// shared freely between worker threads.
pub struct TransformPipeline {
    rules: Vec<CompiledRule>,
    resolver: AssetResolver,
    inline_limit: u64,
    public_path: String,
    source_maps: bool,
    applied: AtomicUsize,
}

impl TransformPipeline {
    pub fn new(config: &BuildConfig, resolver: AssetResolver) -> Result<Self, TransformError> {
        let rules = config
            .rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            resolver,
            inline_limit: config.assets.inline_limit,
            public_path: config.output.public_path.clone(),
            source_maps: config.output.source_maps,
            applied: AtomicUsize::new(0),
        })
    }

    /// Transform one module's raw bytes. Deterministic in `(id, raw)`; called
    /// exactly once per module by graph construction.
    pub fn apply(&self, id: &ModuleId, raw: &[u8]) -> Result<TransformOutput, TransformError> {
        self.applied.fetch_add(1, Ordering::Relaxed);

        let path_str = id.path().to_string_lossy();
        let rule = self
            .rules
            .iter()
            .find(|r| r.test.is_match(&path_str) && !excluded(r, &path_str));

        let Some(rule) = rule else {
            debug!(module = %id, "no transform rule matched, carrying through");
            return Ok(TransformOutput {
                kind: ModuleKind::Raw,
                content: String::from_utf8_lossy(raw).into_owned(),
                source_map: None,
                side_assets: Vec::new(),
            });
        };

        match &rule.kind {
            TransformKind::Script => {
                let source = utf8(id, raw)?;
                let display = self.display_name(id);
                let lowered = script::lower(source, id.path(), &display)?;
                Ok(TransformOutput {
                    kind: ModuleKind::Script,
                    content: lowered.content,
                    source_map: self.source_maps.then_some(lowered.map),
                    side_assets: Vec::new(),
                })
            }
            TransformKind::Style(options) => {
                let source = utf8(id, raw)?;
                let ctx = style::StyleContext {
                    resolver: &self.resolver,
                    inline_limit: self.inline_limit,
                    public_path: &self.public_path,
                };
                style::extract(id, source, options, &ctx)
            }
            TransformKind::Asset => Ok(asset::passthrough(
                id,
                raw,
                &asset::AssetContext {
                    inline_limit: self.inline_limit,
                    public_path: &self.public_path,
                },
            )),
        }
    }

    /// Dependency specifiers in transformed module text, in textual order,
    /// deduplicated. Scans `require("...")` calls outside comments and
    /// strings.
    pub fn scan_requires(
        &self,
        content: &str,
        file: &Path,
    ) -> Result<Vec<String>, TransformError> {
        let masked = lexer::mask(content, file)?;
        let bytes = masked.as_bytes();
        let mut specifiers = Vec::new();
        let mut i = 0;

        while let Some(rel) = masked[i..].find("require") {
            let at = i + rel;
            i = at + "require".len();
            if at > 0 {
                let prev = bytes[at - 1];
                if is_ident_byte(prev) || prev == b'.' {
                    continue;
                }
            }
            let Some(open) = next_significant(bytes, i) else {
                continue;
            };
            if bytes[open] != b'(' {
                continue;
            }
            let Some(quote_at) = next_significant(bytes, open + 1) else {
                continue;
            };
            let quote = bytes[quote_at];
            if quote != b'"' && quote != b'\'' {
                // Dynamic argument; not statically analyzable, left alone.
                continue;
            }
            let Some(close_rel) = masked[quote_at + 1..].find(quote as char) else {
                continue;
            };
            let close_at = quote_at + 1 + close_rel;
            let value = content[quote_at + 1..close_at].to_string();
            if !specifiers.contains(&value) {
                specifiers.push(value);
            }
            i = close_at + 1;
        }
        Ok(specifiers)
    }

    /// Total `apply` calls since construction.
    pub fn transforms_applied(&self) -> usize {
        self.applied.load(Ordering::Relaxed)
    }

    /// Module path relative to the primary root, for source-map and runtime
    /// display.
    fn display_name(&self, id: &ModuleId) -> String {
        id.path()
            .strip_prefix(self.resolver.primary_root())
            .unwrap_or(id.path())
            .to_string_lossy()
            .into_owned()
    }
}

fn compile_rule(rule: &TransformRule) -> Result<CompiledRule, TransformError> {
    let test = compile(&rule.test)?;
    let exclude = rule.exclude.as_deref().map(compile).transpose()?;
    Ok(CompiledRule {
        test,
        exclude,
        kind: rule.kind.clone(),
    })
}

fn compile(pattern: &str) -> Result<Regex, TransformError> {
    Regex::new(pattern).map_err(|e| TransformError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn excluded(rule: &CompiledRule, path: &str) -> bool {
    rule.exclude.as_ref().is_some_and(|re| re.is_match(path))
}

fn utf8<'a>(id: &ModuleId, raw: &'a [u8]) -> Result<&'a str, TransformError> {
    std::str::from_utf8(raw).map_err(|_| TransformError::NotUtf8 {
        file: id.path().to_path_buf(),
    })
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn next_significant(bytes: &[u8], mut i: usize) -> Option<usize> {
    while i < bytes.len() {
        if !bytes[i].is_ascii_whitespace() {
            return Some(i);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindle_config::StyleOptions;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn pipeline_in(dir: &TempDir) -> TransformPipeline {
        let config = BuildConfig::builder(dir.path().join("dist"))
            .entry("index", "./index.js")
            .rule(TransformRule::new(r"\.js$", TransformKind::Script).exclude("node_modules"))
            .rule(TransformRule::new(
                r"\.css$",
                TransformKind::Style(StyleOptions::default()),
            ))
            .rule(TransformRule::new(r"\.(png|jpg)$", TransformKind::Asset))
            .build();
        let resolver = AssetResolver::new(&config.resolve, dir.path());
        TransformPipeline::new(&config, resolver).unwrap()
    }

    #[test]
    fn first_matching_rule_wins() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let id = ModuleId::new(dir.path().join("app.js"));
        let out = pipeline.apply(&id, b"import x from \"./x\";\n").unwrap();
        assert_eq!(out.kind, ModuleKind::Script);
        assert!(out.content.contains("require(\"./x\")"));
    }

    #[test]
    fn exclude_pattern_vetoes_a_match() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let id = ModuleId::new(dir.path().join("node_modules/dep/index.js"));
        // ESM syntax would fail the script transform; the veto means the
        // file is carried through untouched instead.
        let out = pipeline.apply(&id, b"export const x = 1;\n").unwrap();
        assert_eq!(out.kind, ModuleKind::Raw);
        assert_eq!(out.content, "export const x = 1;\n");
    }

    #[test]
    fn unmatched_module_is_raw() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let id = ModuleId::new(dir.path().join("data.txt"));
        let out = pipeline.apply(&id, b"hello").unwrap();
        assert_eq!(out.kind, ModuleKind::Raw);
        assert_eq!(out.content, "hello");
    }

    #[test]
    fn scan_finds_requires_in_order_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let content = concat!(
            "const a = require(\"./a\");\n",
            "const b = require('./b');\n",
            "const again = require(\"./a\");\n",
            "// require(\"./not-me\")\n",
            "const s = \"require('./nor-me')\";\n",
        );
        let specs = pipeline
            .scan_requires(content, &PathBuf::from("m.js"))
            .unwrap();
        assert_eq!(specs, vec!["./a".to_string(), "./b".to_string()]);
    }

    #[test]
    fn scan_skips_dynamic_arguments() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let specs = pipeline
            .scan_requires("require(name); require(\"./real\");", &PathBuf::from("m.js"))
            .unwrap();
        assert_eq!(specs, vec!["./real".to_string()]);
    }

    #[test]
    fn apply_counter_tracks_calls() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let id = ModuleId::new(dir.path().join("x.txt"));
        pipeline.apply(&id, b"a").unwrap();
        pipeline.apply(&id, b"b").unwrap();
        assert_eq!(pipeline.transforms_applied(), 2);
    }

    #[test]
    fn invalid_utf8_in_script_rule_fails() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_in(&dir);
        let id = ModuleId::new(dir.path().join("bad.js"));
        let err = pipeline.apply(&id, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, TransformError::NotUtf8 { .. }));
    }
}
