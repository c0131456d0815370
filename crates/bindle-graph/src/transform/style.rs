//! Stylesheet extraction.
//!
//! A module recognized as a stylesheet is never inlined into the graph as
//! executable code. Its `@import` references are resolved recursively and
//! bundled into one sheet; `url()` references are resolved through the asset
//! resolver and rewritten to either data URIs (under the inline limit) or
//! emitted fingerprinted files. The module itself becomes a small JS shim
//! that injects the sheet at runtime, or links the extracted file when
//! `StyleOptions.extract` is set.

use std::fs;

use bindle_config::StyleOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::error::TransformError;
use crate::module::{ModuleId, ModuleKind, SideAsset, SideAssetKind};
use crate::resolver::AssetResolver;
use crate::transform::{asset, TransformOutput};

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?\s*;"#).expect("static regex")
});

// One alternative per quoting form; the regex crate has no backreferences.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:'([^']+)'|"([^"]+)"|([^'")]+))\s*\)"#).expect("static regex")
});

pub(crate) struct StyleContext<'a> {
    pub resolver: &'a AssetResolver,
    pub inline_limit: u64,
    pub public_path: &'a str,
}

pub(crate) fn extract(
    id: &ModuleId,
    source: &str,
    options: &StyleOptions,
    ctx: &StyleContext<'_>,
) -> Result<TransformOutput, TransformError> {
    let mut side_assets = Vec::new();
    let mut visited = FxHashSet::default();
    visited.insert(id.clone());
    let sheet = process_sheet(id, source, ctx, &mut visited, &mut side_assets)?;

    let content = if options.extract {
        let hash = short_hash(sheet.as_bytes());
        let filename = format!("assets/{hash}.css");
        let href = public_url(ctx.public_path, &filename);
        side_assets.push(SideAsset {
            filename,
            bytes: sheet.into_bytes(),
            kind: SideAssetKind::Stylesheet,
        });
        link_shim(&href)
    } else {
        inject_shim(&sheet)
    };

    Ok(TransformOutput {
        kind: ModuleKind::StyleShim,
        content,
        source_map: None,
        side_assets,
    })
}

/// Bundle one sheet: inline `@import`s depth-first, rewrite `url()`s.
///
/// Each sheet's own text is rewritten exactly once; recursed imports arrive
/// already rewritten and are spliced in verbatim.
fn process_sheet(
    id: &ModuleId,
    source: &str,
    ctx: &StyleContext<'_>,
    visited: &mut FxHashSet<ModuleId>,
    side_assets: &mut Vec<SideAsset>,
) -> Result<String, TransformError> {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;

    for caps in IMPORT_RE.captures_iter(source) {
        let whole = caps.get(0).expect("match");
        let spec = &caps[1];
        out.push_str(&rewrite_urls(
            id,
            &source[cursor..whole.start()],
            ctx,
            side_assets,
        )?);
        cursor = whole.end();

        if is_external_ref(spec) {
            // Remote imports stay as written.
            out.push_str(whole.as_str());
            continue;
        }

        let dep = ctx
            .resolver
            .resolve(Some(id), spec)
            .map_err(|e| TransformError::StyleReference {
                file: id.path().to_path_buf(),
                source: Box::new(e),
            })?;
        // An @import cycle is ill-formed CSS; the second visit contributes
        // nothing rather than recursing forever.
        if !visited.insert(dep.clone()) {
            continue;
        }
        let imported = fs::read_to_string(dep.path()).map_err(|e| TransformError::Io {
            file: dep.path().to_path_buf(),
            source: e,
        })?;
        let processed = process_sheet(&dep, &imported, ctx, visited, side_assets)?;
        out.push_str(&processed);
    }
    out.push_str(&rewrite_urls(id, &source[cursor..], ctx, side_assets)?);
    Ok(out)
}

fn rewrite_urls(
    id: &ModuleId,
    sheet: &str,
    ctx: &StyleContext<'_>,
    side_assets: &mut Vec<SideAsset>,
) -> Result<String, TransformError> {
    let mut out = String::with_capacity(sheet.len());
    let mut cursor = 0;

    for caps in URL_RE.captures_iter(sheet) {
        let whole = caps.get(0).expect("match");
        let target = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .expect("one alternative matched")
            .as_str()
            .trim();
        out.push_str(&sheet[cursor..whole.start()]);
        cursor = whole.end();

        if is_external_ref(target) {
            out.push_str(whole.as_str());
            continue;
        }

        let dep = ctx
            .resolver
            .resolve(Some(id), target)
            .map_err(|e| TransformError::StyleReference {
                file: id.path().to_path_buf(),
                source: Box::new(e),
            })?;
        let bytes = fs::read(dep.path()).map_err(|e| TransformError::Io {
            file: dep.path().to_path_buf(),
            source: e,
        })?;

        if bytes.len() as u64 <= ctx.inline_limit {
            out.push_str(&format!("url({})", asset::data_uri(&dep, &bytes)));
        } else {
            let filename = asset::hashed_filename(&dep, &bytes);
            let url = public_url(ctx.public_path, &filename);
            if !side_assets.iter().any(|a| a.filename == filename) {
                side_assets.push(SideAsset {
                    filename: filename.clone(),
                    bytes,
                    kind: SideAssetKind::Binary,
                });
            }
            out.push_str(&format!("url({url})"));
        }
    }
    out.push_str(&sheet[cursor..]);
    Ok(out)
}

fn is_external_ref(target: &str) -> bool {
    target.starts_with("data:")
        || target.starts_with("http:")
        || target.starts_with("https:")
        || target.starts_with("//")
        || target.starts_with('#')
}

pub(crate) fn public_url(public_path: &str, filename: &str) -> String {
    let base = public_path.trim_end_matches('/');
    format!("{base}/{filename}")
}

fn short_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex()[..16].to_string()
}

fn inject_shim(sheet: &str) -> String {
    let literal = serde_json::to_string(sheet).expect("string serializes");
    format!(
        "var css = {literal};\n\
         var style = document.createElement(\"style\");\n\
         style.textContent = css;\n\
         document.head.appendChild(style);\n\
         module.exports = css;\n"
    )
}

fn link_shim(href: &str) -> String {
    format!(
        "var href = \"{href}\";\n\
         var link = document.createElement(\"link\");\n\
         link.rel = \"stylesheet\";\n\
         link.href = href;\n\
         document.head.appendChild(link);\n\
         module.exports = href;\n"
    )
}
