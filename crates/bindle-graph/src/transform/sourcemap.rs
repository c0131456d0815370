//! Minimal source-map v3 support.
//!
//! Transforms in this pipeline are line-preserving, so mappings are stored as
//! one optional segment per generated line (column is always zero). That is
//! enough to point a debugger at the original line and keeps the encoder
//! tiny: the v3 JSON payload with base64-VLQ `mappings` is emitted directly.

use serde::{Deserialize, Serialize};

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Mapping for one generated line: which source file and original line it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMapping {
    /// Index into `sources`.
    pub source: u32,
    /// 0-based original line.
    pub line: u32,
}

/// Line-based source map for transformed or bundled output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    /// Original source paths, referenced by segment indices.
    pub sources: Vec<String>,
    /// One entry per generated line; `None` for synthesized lines.
    pub mappings: Vec<Option<LineMapping>>,
}

impl SourceMap {
    /// Identity map: every generated line maps to the same line of a single
    /// source.
    pub fn identity(source: impl Into<String>, line_count: usize) -> Self {
        Self {
            sources: vec![source.into()],
            mappings: (0..line_count)
                .map(|line| {
                    Some(LineMapping {
                        source: 0,
                        line: line as u32,
                    })
                })
                .collect(),
        }
    }

    /// Append a line that has no original counterpart.
    pub fn push_synthetic(&mut self) {
        self.mappings.push(None);
    }

    /// Serialize to the source-map v3 JSON format.
    pub fn to_json(&self, file: &str) -> String {
        let payload = serde_json::json!({
            "version": 3,
            "file": file,
            "sources": self.sources,
            "names": [],
            "mappings": self.encode_mappings(),
        });
        payload.to_string()
    }

    fn encode_mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_source: i64 = 0;
        let mut prev_line: i64 = 0;
        for (i, mapping) in self.mappings.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            if let Some(m) = mapping {
                // Segment fields: generated column, source index, original
                // line, original column. All but the first are deltas.
                encode_vlq(0, &mut out);
                encode_vlq(i64::from(m.source) - prev_source, &mut out);
                encode_vlq(i64::from(m.line) - prev_line, &mut out);
                encode_vlq(0, &mut out);
                prev_source = i64::from(m.source);
                prev_line = i64::from(m.line);
            }
        }
        out
    }
}

/// Base64-VLQ encode one signed value.
fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0x1f) as u8;
        vlq >>= 5;
        if vlq != 0 {
            digit |= 0x20;
        }
        out.push(BASE64_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
