//! ES module syntax lowering.
//!
//! Rewrites static `import`/`export` forms into the bundler runtime's
//! CommonJS-style calls (`require`, `exports`). The rewrite is
//! line-preserving: a multi-line statement collapses onto its first line and
//! the remaining lines go blank, so a line-based identity source map stays
//! truthful. Lowered output contains no module syntax, which makes the
//! transform idempotent: re-running on already-lowered input is a byte-level
//! no-op.
//!
//! Scope: static ESM forms. Dynamic `import()` and `import.meta` are left
//! untouched.

use std::path::Path;

use crate::error::TransformError;
use crate::transform::lexer::{self, mask};
use crate::transform::sourcemap::SourceMap;

/// Result of lowering one module.
#[derive(Debug)]
pub struct Lowered {
    pub content: String,
    pub map: SourceMap,
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

struct Rewriter<'a> {
    source: &'a str,
    masked: &'a str,
    file: &'a Path,
    edits: Vec<Edit>,
    /// `exports.alias = local;` bindings appended after the module body, once
    /// every declaration has initialized.
    epilogue: Vec<String>,
    star_counter: usize,
}

/// Lower one module's source. `display_name` becomes the source-map `sources`
/// entry (typically the root-relative path).
pub fn lower(source: &str, file: &Path, display_name: &str) -> Result<Lowered, TransformError> {
    let masked = mask(source, file)?;
    let mut rw = Rewriter {
        source,
        masked: &masked,
        file,
        edits: Vec::new(),
        epilogue: Vec::new(),
        star_counter: 0,
    };
    rw.collect()?;

    let mut rewritten = rw.apply();
    let newline_count = rewritten.matches('\n').count();
    let mapped_lines = if rewritten.ends_with('\n') {
        newline_count
    } else {
        newline_count + 1
    };
    let mut map = SourceMap::identity(display_name, mapped_lines);

    if !rw.epilogue.is_empty() {
        if !rewritten.ends_with('\n') {
            rewritten.push('\n');
        }
        rewritten.push_str(&rw.epilogue.join(" "));
        rewritten.push('\n');
        map.push_synthetic();
    }

    Ok(Lowered {
        content: rewritten,
        map,
    })
}

impl<'a> Rewriter<'a> {
    fn collect(&mut self) -> Result<(), TransformError> {
        let bytes = self.masked.as_bytes();
        let mut depth = 0usize;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                _ if depth == 0 && self.keyword_at(i, "import") => {
                    i = self.handle_import(i)?;
                }
                _ if depth == 0 && self.keyword_at(i, "export") => {
                    i = self.handle_export(i)?;
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    /// Exact word match: not part of a longer identifier, not a property
    /// access like `obj.import`.
    fn keyword_at(&self, i: usize, word: &str) -> bool {
        let bytes = self.masked.as_bytes();
        if !starts_with_at(bytes, i, word) {
            return false;
        }
        if i > 0 && (is_ident_byte(bytes[i - 1]) || prev_significant(bytes, i) == Some(b'.')) {
            return false;
        }
        match bytes.get(i + word.len()) {
            Some(&b) => !is_ident_byte(b),
            None => true,
        }
    }

    fn handle_import(&mut self, start: usize) -> Result<usize, TransformError> {
        let after_kw = start + "import".len();
        let next = next_significant(self.masked.as_bytes(), after_kw);
        // Dynamic import() and import.meta pass through untouched.
        if matches!(next.map(|(_, b)| b), Some(b'(') | Some(b'.')) {
            return Ok(after_kw);
        }

        let (spec, spec_end) = self.module_string(after_kw, start)?;
        let end = self.statement_end(spec_end);

        let clause_end = match next.map(|(idx, b)| (idx, b)) {
            Some((idx, b'\'')) | Some((idx, b'"')) => idx, // bare `import "m"`
            _ => self.find_from_keyword(after_kw, start)?,
        };
        let clause = parse_import_clause(&self.masked[after_kw..clause_end]);

        let replacement = match clause {
            ImportClause::SideEffect => format!("require(\"{spec}\");"),
            ImportClause::Namespace { namespace, default } => match default {
                Some(d) => format!(
                    "const {namespace} = require(\"{spec}\"), {d} = {namespace}.default;"
                ),
                None => format!("const {namespace} = require(\"{spec}\");"),
            },
            ImportClause::Bindings(parts) => {
                format!("const {{ {} }} = require(\"{spec}\");", parts.join(", "))
            }
        };
        self.push_edit(start, end, replacement);
        Ok(end)
    }

    fn handle_export(&mut self, start: usize) -> Result<usize, TransformError> {
        let bytes = self.masked.as_bytes();
        let after_kw = start + "export".len();
        let Some((tok_start, tok)) = next_significant(bytes, after_kw) else {
            return Err(self.err(start, "dangling `export` at end of module"));
        };

        match tok {
            b'{' => self.export_braces(start, tok_start),
            b'*' => self.export_star(start, tok_start),
            _ => {
                if self.keyword_at(tok_start, "default") {
                    let end = tok_start + "default".len();
                    self.push_edit(start, end, "exports.default =".to_string());
                    Ok(end)
                } else {
                    self.export_declaration(start, tok_start)
                }
            }
        }
    }

    /// `export { a, b as c };` and `export { a } from "m";`
    fn export_braces(&mut self, start: usize, brace: usize) -> Result<usize, TransformError> {
        let close = self
            .matching_brace(brace)
            .ok_or_else(|| self.err(brace, "unterminated export list"))?;
        let names = parse_export_list(&self.masked[brace + 1..close]);

        let bytes = self.masked.as_bytes();
        let after = next_significant(bytes, close + 1);
        if after.is_some() && self.keyword_at(after.unwrap().0, "from") {
            let (spec, spec_end) = self.module_string(close + 1, start)?;
            let end = self.statement_end(spec_end);
            let tmp = self.next_star_name();
            let mut repl = format!("var {tmp} = require(\"{spec}\");");
            for (local, exported) in &names {
                repl.push_str(&format!(" exports.{exported} = {tmp}.{local};"));
            }
            self.push_edit(start, end, repl);
            Ok(end)
        } else {
            let end = self.statement_end(close + 1);
            for (local, exported) in &names {
                self.epilogue.push(format!("exports.{exported} = {local};"));
            }
            self.push_edit(start, end, String::new());
            Ok(end)
        }
    }

    /// `export * from "m";` and `export * as ns from "m";`
    fn export_star(&mut self, start: usize, star: usize) -> Result<usize, TransformError> {
        let bytes = self.masked.as_bytes();
        let after = next_significant(bytes, star + 1);
        let ns = match after {
            Some((idx, _)) if self.keyword_at(idx, "as") => {
                let (name_start, _) = next_significant(bytes, idx + 2)
                    .ok_or_else(|| self.err(idx, "expected identifier after `as`"))?;
                Some(self.ident_at(name_start))
            }
            _ => None,
        };

        let (spec, spec_end) = self.module_string(star + 1, start)?;
        let end = self.statement_end(spec_end);

        let replacement = match ns {
            Some(name) => format!("exports.{name} = require(\"{spec}\");"),
            None => {
                let tmp = self.next_star_name();
                let key = format!("__k{}", self.star_counter - 1);
                format!(
                    "var {tmp} = require(\"{spec}\"); \
                     for (var {key} in {tmp}) if ({key} !== \"default\") \
                     exports[{key}] = {tmp}[{key}];"
                )
            }
        };
        self.push_edit(start, end, replacement);
        Ok(end)
    }

    /// `export const/let/var/function/class/async function ...` strips the
    /// `export ` keyword and defers the binding to the epilogue.
    fn export_declaration(&mut self, start: usize, decl: usize) -> Result<usize, TransformError> {
        let bytes = self.masked.as_bytes();
        let names = if self.keyword_at(decl, "function") {
            vec![self.declaration_name(decl + 8)?]
        } else if self.keyword_at(decl, "class") {
            vec![self.declaration_name(decl + 5)?]
        } else if self.keyword_at(decl, "async") {
            let (f, _) = next_significant(bytes, decl + 5)
                .ok_or_else(|| self.err(decl, "dangling `export async`"))?;
            if !self.keyword_at(f, "function") {
                return Err(self.err(decl, "unsupported export form"));
            }
            vec![self.declaration_name(f + 8)?]
        } else if self.keyword_at(decl, "const") {
            self.declarator_names(decl + 5)
        } else if self.keyword_at(decl, "let") || self.keyword_at(decl, "var") {
            self.declarator_names(decl + 3)
        } else {
            return Err(self.err(start, "unsupported export form"));
        };

        if names.is_empty() {
            return Err(self.err(decl, "could not determine exported binding"));
        }
        for name in &names {
            self.epilogue.push(format!("exports.{name} = {name};"));
        }
        // Strip just the `export ` prefix; the declaration stays in place.
        self.push_edit(start, decl, String::new());
        Ok(decl)
    }

    /// Name of a function/class declaration, skipping generator `*`.
    fn declaration_name(&self, after_kw: usize) -> Result<String, TransformError> {
        let bytes = self.masked.as_bytes();
        let mut i = after_kw;
        if let Some((idx, b'*')) = next_significant(bytes, i) {
            i = idx + 1;
        }
        let (name_start, b) = next_significant(bytes, i)
            .ok_or_else(|| self.err(after_kw, "expected declaration name"))?;
        if !is_ident_start(b) {
            return Err(self.err(name_start, "anonymous declarations cannot be exported this way"));
        }
        Ok(self.ident_at(name_start))
    }

    /// Binding names of `const a = ..., {b, c: d} = ...;` declarators.
    fn declarator_names(&self, from: usize) -> Vec<String> {
        let bytes = self.masked.as_bytes();
        let mut names = Vec::new();
        let mut depth = 0i32;
        let mut expecting_binding = true;
        let mut i = from;
        while i < bytes.len() {
            let b = bytes[i];
            if expecting_binding && (b == b'{' || b == b'[') {
                // Destructuring pattern: collect value-side identifiers.
                let inner_end = matching_bracket(bytes, i).unwrap_or(bytes.len());
                collect_pattern_names(&self.masked[i + 1..inner_end.min(bytes.len())], &mut names);
                expecting_binding = false;
                i = inner_end.saturating_add(1);
                continue;
            }
            if expecting_binding && is_ident_start(b) {
                let name = self.ident_at(i);
                i += name.len();
                names.push(name);
                expecting_binding = false;
                continue;
            }
            match b {
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    i += 1;
                }
                b')' | b']' | b'}' => {
                    depth -= 1;
                    i += 1;
                }
                b';' if depth == 0 => break,
                b'\n' if depth == 0 && statement_looks_done(bytes, i) => break,
                b',' if depth == 0 => {
                    expecting_binding = true;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        names
    }

    fn ident_at(&self, start: usize) -> String {
        let bytes = self.masked.as_bytes();
        let mut end = start;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }
        self.masked[start..end].to_string()
    }

    /// First string literal after `from`; errors when missing.
    fn module_string(&self, from: usize, stmt_start: usize) -> Result<(String, usize), TransformError> {
        let bytes = self.masked.as_bytes();
        let mut i = from;
        while i < bytes.len() {
            match bytes[i] {
                b'\'' | b'"' => {
                    let quote = bytes[i];
                    let close = bytes[i + 1..]
                        .iter()
                        .position(|&b| b == quote)
                        .map(|off| i + 1 + off)
                        .ok_or_else(|| self.err(i, "unterminated module specifier"))?;
                    return Ok((self.source[i + 1..close].to_string(), close + 1));
                }
                b';' => break,
                _ => i += 1,
            }
        }
        Err(self.err(stmt_start, "expected module specifier string"))
    }

    fn find_from_keyword(&self, after: usize, stmt_start: usize) -> Result<usize, TransformError> {
        let mut i = after;
        let bytes = self.masked.as_bytes();
        while i < bytes.len() {
            if self.keyword_at(i, "from") {
                return Ok(i);
            }
            if bytes[i] == b'\'' || bytes[i] == b'"' {
                break;
            }
            i += 1;
        }
        Err(self.err(stmt_start, "expected `from` in import statement"))
    }

    fn statement_end(&self, after: usize) -> usize {
        let bytes = self.masked.as_bytes();
        match next_significant(bytes, after) {
            Some((idx, b';')) => idx + 1,
            _ => after,
        }
    }

    fn matching_brace(&self, open: usize) -> Option<usize> {
        matching_bracket(self.masked.as_bytes(), open)
    }

    fn next_star_name(&mut self) -> String {
        let name = format!("__star{}", self.star_counter);
        self.star_counter += 1;
        name
    }

    fn push_edit(&mut self, start: usize, end: usize, mut replacement: String) {
        // Keep the statement's newlines so line numbering survives.
        for _ in self.source[start..end].matches('\n') {
            replacement.push('\n');
        }
        self.edits.push(Edit {
            start,
            end,
            replacement,
        });
    }

    fn apply(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in &self.edits {
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.replacement);
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    fn err(&self, offset: usize, message: &str) -> TransformError {
        lexer::syntax(self.source, self.file, offset, message)
    }
}

enum ImportClause {
    SideEffect,
    Namespace {
        namespace: String,
        default: Option<String>,
    },
    Bindings(Vec<String>),
}

/// Parse the text between `import` and `from` into destructuring parts.
fn parse_import_clause(clause: &str) -> ImportClause {
    let clause = clause.trim();
    if clause.is_empty() {
        return ImportClause::SideEffect;
    }

    let mut default_name = None;
    let mut namespace = None;
    let mut named: Vec<String> = Vec::new();

    let (outside, braced) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if close > open => (
            format!("{}{}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    for part in outside.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(rest) = part.strip_prefix('*') {
            let ns = rest.trim().strip_prefix("as").map(str::trim).unwrap_or("");
            if !ns.is_empty() {
                namespace = Some(ns.to_string());
            }
        } else {
            default_name = Some(part.to_string());
        }
    }

    if let Some(list) = braced {
        for part in list.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once(" as ") {
                Some((imported, local)) => {
                    named.push(format!("{}: {}", imported.trim(), local.trim()));
                }
                None => named.push(part.to_string()),
            }
        }
    }

    if let Some(ns) = namespace {
        return ImportClause::Namespace {
            namespace: ns,
            default: default_name,
        };
    }

    let mut parts = Vec::new();
    if let Some(d) = default_name {
        parts.push(format!("default: {d}"));
    }
    parts.extend(named);
    if parts.is_empty() {
        ImportClause::SideEffect
    } else {
        ImportClause::Bindings(parts)
    }
}

/// Parse `a, b as c` into `(local, exported)` pairs.
fn parse_export_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match part.split_once(" as ") {
                Some((local, exported)) => {
                    Some((local.trim().to_string(), exported.trim().to_string()))
                }
                None => Some((part.to_string(), part.to_string())),
            }
        })
        .collect()
}

/// Collect value-side identifiers of a destructuring pattern. Keys followed
/// by `:` are renames, so their value side is what binds.
fn collect_pattern_names(pattern: &str, names: &mut Vec<String>) {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if is_ident_start(bytes[i]) {
            let mut end = i;
            while end < bytes.len() && is_ident_byte(bytes[end]) {
                end += 1;
            }
            let after = next_significant(bytes, end).map(|(_, b)| b);
            if after != Some(b':') {
                names.push(pattern[i..end].to_string());
            }
            i = end;
        } else {
            i += 1;
        }
    }
}

fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let (open_b, close_b) = match bytes[open] {
        b'{' => (b'{', b'}'),
        b'[' => (b'[', b']'),
        b'(' => (b'(', b')'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == open_b {
            depth += 1;
        } else if b == close_b {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// At a depth-0 newline, decide whether the declaration statement continued.
fn statement_looks_done(bytes: &[u8], newline: usize) -> bool {
    match prev_significant(bytes, newline) {
        Some(b) => !matches!(
            b,
            b'=' | b',' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'<' | b'>'
                | b'?' | b':' | b'.' | b'('
        ),
        None => true,
    }
}

fn starts_with_at(bytes: &[u8], i: usize, word: &str) -> bool {
    bytes.len() >= i + word.len() && &bytes[i..i + word.len()] == word.as_bytes()
}

fn next_significant(bytes: &[u8], from: usize) -> Option<(usize, u8)> {
    bytes[from..]
        .iter()
        .enumerate()
        .find(|(_, b)| !b.is_ascii_whitespace())
        .map(|(off, &b)| (from + off, b))
}

fn prev_significant(bytes: &[u8], before: usize) -> Option<u8> {
    bytes[..before]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied()
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn lower_ok(src: &str) -> Lowered {
        lower(src, &PathBuf::from("/src/test.js"), "src/test.js").unwrap()
    }

    #[test]
    fn default_import_becomes_destructured_require() {
        let out = lower_ok("import App from \"./app\";\nApp();\n");
        assert_eq!(
            out.content,
            "const { default: App } = require(\"./app\");\nApp();\n"
        );
    }

    #[test]
    fn named_imports_with_rename() {
        let out = lower_ok("import { a, b as c } from \"./m\";\n");
        assert_eq!(out.content, "const { a, b: c } = require(\"./m\");\n");
    }

    #[test]
    fn namespace_import() {
        let out = lower_ok("import * as util from \"./util\";\n");
        assert_eq!(out.content, "const util = require(\"./util\");\n");
    }

    #[test]
    fn side_effect_import() {
        let out = lower_ok("import \"./style.css\";\n");
        assert_eq!(out.content, "require(\"./style.css\");\n");
    }

    #[test]
    fn export_default_expression() {
        let out = lower_ok("export default function main() {}\n");
        assert_eq!(out.content, "exports.default = function main() {}\n");
    }

    #[test]
    fn export_const_gets_epilogue_binding() {
        let out = lower_ok("export const answer = 42;\n");
        assert_eq!(out.content, "const answer = 42;\nexports.answer = answer;\n");
    }

    #[test]
    fn export_list_with_rename() {
        let out = lower_ok("const a = 1, b = 2;\nexport { a, b as c };\n");
        assert!(out.content.contains("exports.a = a;"));
        assert!(out.content.contains("exports.c = b;"));
        assert!(!out.content.contains("export {"));
    }

    #[test]
    fn reexport_pulls_through_require() {
        let out = lower_ok("export { helper } from \"./helpers\";\n");
        assert!(out.content.contains("require(\"./helpers\")"));
        assert!(out.content.contains("exports.helper = __star0.helper;"));
    }

    #[test]
    fn multiline_import_preserves_line_count() {
        let src = "import {\n  a,\n  b\n} from \"./m\";\nuse(a, b);\n";
        let out = lower_ok(src);
        assert_eq!(
            out.content.matches('\n').count(),
            src.matches('\n').count()
        );
        assert!(out.content.starts_with("const { a, b } = require(\"./m\");\n"));
        assert!(out.content.contains("use(a, b);"));
    }

    #[test]
    fn lowering_is_idempotent() {
        let src = "import x from \"./x\";\nexport const y = x + 1;\n";
        let once = lower_ok(src);
        let twice = lower(&once.content, &PathBuf::from("/src/test.js"), "src/test.js").unwrap();
        assert_eq!(once.content, twice.content);
    }

    #[test]
    fn already_compatible_source_is_untouched() {
        let src = "const x = require(\"./x\");\nmodule.exports = x;\n";
        let out = lower_ok(src);
        assert_eq!(out.content, src);
    }

    #[test]
    fn import_inside_string_is_ignored() {
        let src = "const s = \"import nothing from 'nowhere'\";\n";
        let out = lower_ok(src);
        assert_eq!(out.content, src);
    }

    #[test]
    fn dynamic_import_passes_through() {
        let src = "import(\"./lazy\").then(m => m.run());\n";
        let out = lower_ok(src);
        assert_eq!(out.content, src);
    }

    #[test]
    fn syntax_error_carries_position() {
        let err = lower(
            "const ok = 1;\nimport broken\n",
            &PathBuf::from("/src/bad.js"),
            "src/bad.js",
        )
        .unwrap_err();
        match err {
            TransformError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn source_map_is_identity_over_lines() {
        let out = lower_ok("import a from \"./a\";\nconst b = a;\n");
        assert_eq!(out.map.sources, vec!["src/test.js"]);
        assert_eq!(out.map.mappings.len(), 2);
        assert_eq!(out.map.mappings[1].unwrap().line, 1);
    }

    #[test]
    fn export_star_copies_everything_but_default() {
        let out = lower_ok("export * from \"./all\";\n");
        assert!(out.content.contains("require(\"./all\")"));
        assert!(out.content.contains("!== \"default\""));
    }
}
