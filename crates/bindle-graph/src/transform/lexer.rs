//! Source masking for scanning and rewriting.
//!
//! Rewrites and dependency scans must never fire inside comments, string
//! literals, template literals, or regex literals. Instead of threading lexer
//! state through every scanner, we compute a mask of the source: a byte
//! string of identical length where the contents of comments, strings, and
//! regexes are blanked to spaces (delimiters and newlines kept). Offsets into
//! the mask are offsets into the original, so scanners search the mask and
//! slice the original.
//!
//! The mask pass is also where lexical errors surface: an unterminated
//! string, comment, or template, or unbalanced braces, fail the transform
//! with a position. Downstream dependency discovery cannot proceed on
//! malformed output, so these abort the build.

use std::path::Path;

use crate::error::TransformError;

/// Blank out comment/string/regex interiors, preserving byte offsets.
pub fn mask(source: &str, file: &Path) -> Result<String, TransformError> {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut brace_stack: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                i = blank_line_comment(bytes, i, &mut out);
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i = blank_block_comment(bytes, i, &mut out)
                    .ok_or_else(|| syntax(source, file, i, "unterminated block comment"))?;
            }
            b'\'' | b'"' => {
                i = blank_string(bytes, i, b, &mut out)
                    .ok_or_else(|| syntax(source, file, i, "unterminated string literal"))?;
            }
            b'`' => {
                i = blank_template(bytes, i, &mut out)
                    .ok_or_else(|| syntax(source, file, i, "unterminated template literal"))?;
            }
            b'/' if regex_can_start(&out) => {
                i = blank_regex(bytes, i, &mut out)
                    .ok_or_else(|| syntax(source, file, i, "unterminated regex literal"))?;
            }
            b'{' => {
                brace_stack.push(i);
                out.push(b);
                i += 1;
            }
            b'}' => {
                if brace_stack.pop().is_none() {
                    return Err(syntax(source, file, i, "unmatched closing brace"));
                }
                out.push(b);
                i += 1;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    if let Some(open) = brace_stack.first() {
        return Err(syntax(source, file, *open, "unbalanced braces"));
    }

    // Only ASCII was rewritten, so the mask is valid UTF-8.
    Ok(String::from_utf8(out).expect("mask preserves UTF-8"))
}

/// 1-based line/column for a byte offset.
pub fn position(source: &str, offset: usize) -> (u32, u32) {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let column = match prefix.rfind('\n') {
        Some(nl) => prefix[nl + 1..].chars().count() as u32 + 1,
        None => prefix.chars().count() as u32 + 1,
    };
    (line, column)
}

pub(crate) fn syntax(source: &str, file: &Path, offset: usize, message: &str) -> TransformError {
    let (line, column) = position(source, offset);
    TransformError::Syntax {
        file: file.to_path_buf(),
        line,
        column,
        message: message.to_string(),
    }
}

fn push_blank(out: &mut Vec<u8>, b: u8) {
    out.push(if b == b'\n' { b'\n' } else { b' ' });
}

fn blank_line_comment(bytes: &[u8], start: usize, out: &mut Vec<u8>) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        out.push(b' ');
        i += 1;
    }
    i
}

fn blank_block_comment(bytes: &[u8], start: usize, out: &mut Vec<u8>) -> Option<usize> {
    let mut i = start + 2;
    out.extend_from_slice(b"  ");
    while i < bytes.len() {
        if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            out.extend_from_slice(b"  ");
            return Some(i + 2);
        }
        push_blank(out, bytes[i]);
        i += 1;
    }
    None
}

/// Blank a quoted string, keeping the delimiters so scanners can find the
/// literal's extent and slice its value from the original.
fn blank_string(bytes: &[u8], start: usize, quote: u8, out: &mut Vec<u8>) -> Option<usize> {
    out.push(quote);
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.extend_from_slice(b"  ");
                i += 2;
            }
            b'\n' => return None,
            b if b == quote => {
                out.push(quote);
                return Some(i + 1);
            }
            b => {
                push_blank(out, b);
                i += 1;
            }
        }
    }
    None
}

/// Blank a template literal, recursing into `${}` interpolations as code.
fn blank_template(bytes: &[u8], start: usize, out: &mut Vec<u8>) -> Option<usize> {
    out.push(b'`');
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.extend_from_slice(b"  ");
                i += 2;
            }
            b'`' => {
                out.push(b'`');
                return Some(i + 1);
            }
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                // Interpolation body is code; blank nothing, track nesting.
                out.extend_from_slice(b"${");
                i += 2;
                let mut depth = 1usize;
                while i < bytes.len() && depth > 0 {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        b'`' => {
                            i = blank_template(bytes, i, out)?;
                            continue;
                        }
                        b'\'' | b'"' => {
                            i = blank_string(bytes, i, bytes[i], out)?;
                            continue;
                        }
                        _ => {}
                    }
                    out.push(bytes[i]);
                    i += 1;
                }
                if depth > 0 {
                    return None;
                }
            }
            b => {
                push_blank(out, b);
                i += 1;
            }
        }
    }
    None
}

/// Heuristic: a `/` starts a regex when the previous significant token cannot
/// end an expression.
fn regex_can_start(out: &[u8]) -> bool {
    let mut idx = out.len();
    while idx > 0 {
        let b = out[idx - 1];
        if b.is_ascii_whitespace() {
            idx -= 1;
            continue;
        }
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' {
            // Could be an identifier (division) or a keyword (regex).
            let mut word_start = idx;
            while word_start > 0 {
                let c = out[word_start - 1];
                if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
                    word_start -= 1;
                } else {
                    break;
                }
            }
            const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
                "return", "typeof", "case", "in", "of", "new", "delete", "void", "do", "else",
                "instanceof", "yield", "await",
            ];
            let word = std::str::from_utf8(&out[word_start..idx]).unwrap_or("");
            return REGEX_PRECEDING_KEYWORDS.contains(&word);
        }
        return !matches!(b, b')' | b']' | b'\'' | b'"' | b'`');
    }
    true
}

fn blank_regex(bytes: &[u8], start: usize, out: &mut Vec<u8>) -> Option<usize> {
    out.push(b'/');
    let mut i = start + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.extend_from_slice(b"  ");
                i += 2;
            }
            b'\n' => return None,
            b'[' => {
                in_class = true;
                out.push(b' ');
                i += 1;
            }
            b']' if in_class => {
                in_class = false;
                out.push(b' ');
                i += 1;
            }
            b'/' if !in_class => {
                out.push(b'/');
                return Some(i + 1);
            }
            b => {
                push_blank(out, b);
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn mask_ok(src: &str) -> String {
        mask(src, &PathBuf::from("test.js")).unwrap()
    }

    #[test]
    fn mask_preserves_length_and_newlines() {
        let src = "const a = \"import b\";\n// import c\nconst d = 1;";
        let masked = mask_ok(src);
        assert_eq!(masked.len(), src.len());
        assert_eq!(
            masked.matches('\n').count(),
            src.matches('\n').count()
        );
        assert!(!masked.contains("import"));
        assert!(masked.contains("const d = 1;"));
    }

    #[test]
    fn mask_keeps_string_delimiters() {
        let masked = mask_ok("require(\"./dep\")");
        assert_eq!(masked, "require(\"     \")");
    }

    #[test]
    fn template_interpolation_stays_code() {
        let masked = mask_ok("let x = `a ${require(\"./m\")} b`;");
        assert!(masked.contains("require(\"   \")"));
        assert!(!masked.contains("a "));
    }

    #[test]
    fn regex_literal_is_blanked() {
        let masked = mask_ok("const re = /\"'{/; done();");
        assert!(masked.contains("done();"));
        assert!(!masked.contains('{'));
    }

    #[test]
    fn division_is_not_a_regex() {
        let masked = mask_ok("const x = a / b / c;");
        assert_eq!(masked, "const x = a / b / c;");
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = mask("const s = \"oops;\n", &PathBuf::from("bad.js")).unwrap_err();
        match err {
            TransformError::Syntax { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 11);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unbalanced_braces_point_at_the_open() {
        let err = mask("function f() {\n  nope(;\n", &PathBuf::from("bad.js")).unwrap_err();
        match err {
            TransformError::Syntax { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("unbalanced"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
