//! Binary asset passthrough.
//!
//! Assets never contribute code to the graph. They become a tiny shim module
//! exporting a URL: a data URI when the file fits under the inline limit, or
//! the public URL of a content-addressed copy emitted next to the bundle.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::module::{ModuleId, ModuleKind, SideAsset, SideAssetKind};
use crate::transform::style::public_url;
use crate::transform::TransformOutput;

pub(crate) struct AssetContext<'a> {
    pub inline_limit: u64,
    pub public_path: &'a str,
}

pub(crate) fn passthrough(id: &ModuleId, raw: &[u8], ctx: &AssetContext<'_>) -> TransformOutput {
    if raw.len() as u64 <= ctx.inline_limit {
        return TransformOutput {
            kind: ModuleKind::AssetShim,
            content: format!("module.exports = \"{}\";\n", data_uri(id, raw)),
            source_map: None,
            side_assets: Vec::new(),
        };
    }

    let filename = hashed_filename(id, raw);
    let url = public_url(ctx.public_path, &filename);
    TransformOutput {
        kind: ModuleKind::AssetShim,
        content: format!("module.exports = \"{url}\";\n"),
        source_map: None,
        side_assets: vec![SideAsset {
            filename,
            bytes: raw.to_vec(),
            kind: SideAssetKind::Binary,
        }],
    }
}

/// Content-addressed filename under `assets/`, keeping the original
/// extension so servers pick a sensible content type.
pub(crate) fn hashed_filename(id: &ModuleId, bytes: &[u8]) -> String {
    let hash = &blake3::hash(bytes).to_hex()[..16];
    match id.extension() {
        Some(ext) => format!("assets/{hash}{ext}"),
        None => format!("assets/{hash}"),
    }
}

pub(crate) fn data_uri(id: &ModuleId, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_for(id), STANDARD.encode(bytes))
}

fn mime_for(id: &ModuleId) -> &'static str {
    match id.extension().as_deref() {
        Some(".png") => "image/png",
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".gif") => "image/gif",
        Some(".svg") => "image/svg+xml",
        Some(".webp") => "image/webp",
        Some(".ico") => "image/x-icon",
        Some(".woff") => "font/woff",
        Some(".woff2") => "font/woff2",
        Some(".ttf") => "font/ttf",
        Some(".eot") => "application/vnd.ms-fontobject",
        Some(".css") => "text/css",
        Some(".json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(PathBuf::from(format!("/project/src/{name}")))
    }

    #[test]
    fn small_asset_inlines_as_data_uri() {
        let out = passthrough(
            &id("dot.png"),
            &[0x89, 0x50, 0x4e, 0x47],
            &AssetContext {
                inline_limit: 8192,
                public_path: "/",
            },
        );
        assert_eq!(out.kind, ModuleKind::AssetShim);
        assert!(out.content.contains("data:image/png;base64,iVBORw=="));
        assert!(out.side_assets.is_empty());
    }

    #[test]
    fn large_asset_is_emitted_and_referenced_by_url() {
        let bytes = vec![0u8; 10_000];
        let out = passthrough(
            &id("photo.jpg"),
            &bytes,
            &AssetContext {
                inline_limit: 8192,
                public_path: "/static/",
            },
        );
        assert_eq!(out.side_assets.len(), 1);
        let asset = &out.side_assets[0];
        assert!(asset.filename.starts_with("assets/"));
        assert!(asset.filename.ends_with(".jpg"));
        assert!(out
            .content
            .contains(&format!("module.exports = \"/static/{}\"", asset.filename)));
    }

    #[test]
    fn hashed_filename_is_stable_for_identical_bytes() {
        let a = hashed_filename(&id("one.png"), b"same bytes");
        let b = hashed_filename(&id("two.png"), b"same bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_extension_gets_octet_stream() {
        let out = passthrough(
            &id("blob.xyz"),
            &[1, 2, 3],
            &AssetContext {
                inline_limit: 8192,
                public_path: "/",
            },
        );
        assert!(out.content.contains("application/octet-stream"));
    }
}
