//! Module identity and per-module build records.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Canonical identity of a resolved source file.
///
/// Always an absolute, cleaned path; two records for the same file compare
/// equal regardless of how they were reached. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(Arc<PathBuf>);

impl ModuleId {
    /// Wrap an already-canonicalized absolute path.
    pub fn new(path: PathBuf) -> Self {
        debug_assert!(path.is_absolute(), "module identity must be absolute");
        Self(Arc::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File extension with leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        self.0.extension().map(|e| format!(".{}", e.to_string_lossy()))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for ModuleId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// What a record's transformed content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Executable script lowered to runtime calls.
    Script,
    /// JS shim that injects or links an extracted stylesheet.
    StyleShim,
    /// JS shim exporting a binary asset's URL or data URI.
    AssetShim,
    /// Unmatched content carried through verbatim, never scanned.
    Raw,
}

/// Output produced by a transform that is not itself an executable module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideAsset {
    /// Output-relative filename, already fingerprinted.
    pub filename: String,
    /// Raw bytes to emit.
    pub bytes: Vec<u8>,
    pub kind: SideAssetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideAssetKind {
    Stylesheet,
    Binary,
}

/// One resolved source file and everything the build learned about it.
#[derive(Debug)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub kind: ModuleKind,
    /// Bytes as read from disk, before any transform.
    pub raw: Vec<u8>,
    /// Transformed module text, final once the record enters the graph.
    pub content: String,
    /// Dependency specifiers as written, in textual order.
    pub specifiers: Vec<String>,
    /// Specifier -> resolved identity, filled during graph construction.
    pub resolved: Vec<(String, ModuleId)>,
    /// Transform-produced side assets (extracted styles, emitted binaries).
    pub side_assets: Vec<SideAsset>,
    /// Source map for the transformed content, when the transform produced one.
    pub source_map: Option<crate::transform::SourceMap>,
    hash: OnceCell<String>,
}

impl ModuleRecord {
    pub fn new(id: ModuleId, kind: ModuleKind, raw: Vec<u8>, content: String) -> Self {
        Self {
            id,
            kind,
            raw,
            content,
            specifiers: Vec::new(),
            resolved: Vec::new(),
            side_assets: Vec::new(),
            source_map: None,
            hash: OnceCell::new(),
        }
    }

    /// Identity of the dependency a specifier resolved to, if recorded.
    pub fn resolved_id(&self, specifier: &str) -> Option<&ModuleId> {
        self.resolved
            .iter()
            .find(|(spec, _)| spec == specifier)
            .map(|(_, id)| id)
    }

    /// Seal the record's content hash. Called once all transforms for the
    /// module have completed; later calls are no-ops returning the first hash.
    pub fn seal_hash(&self) -> &str {
        self.hash
            .get_or_init(|| blake3::hash(self.content.as_bytes()).to_hex().to_string())
    }

    /// Content hash of the final transformed content.
    ///
    /// Fails if the record has not been sealed yet; the hash is only valid
    /// once every transform for the module has run.
    pub fn content_hash(&self) -> Result<&str, GraphError> {
        self.hash
            .get()
            .map(String::as_str)
            .ok_or_else(|| GraphError::HashNotReady {
                module: self.id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ModuleRecord {
        ModuleRecord::new(
            ModuleId::new(PathBuf::from("/src/index.js")),
            ModuleKind::Script,
            b"raw".to_vec(),
            "content".to_string(),
        )
    }

    #[test]
    fn hash_unavailable_before_seal() {
        let rec = record();
        assert!(matches!(
            rec.content_hash(),
            Err(GraphError::HashNotReady { .. })
        ));
    }

    #[test]
    fn seal_is_idempotent() {
        let rec = record();
        let first = rec.seal_hash().to_string();
        assert_eq!(rec.seal_hash(), first);
        assert_eq!(rec.content_hash().unwrap(), first);
    }

    #[test]
    fn identity_compares_by_path() {
        let a = ModuleId::new(PathBuf::from("/src/a.js"));
        let b = ModuleId::new(PathBuf::from("/src/a.js"));
        assert_eq!(a, b);
        assert_eq!(a.extension().as_deref(), Some(".js"));
    }
}
