//! Specifier resolution against the filesystem snapshot.
//!
//! Pure over the snapshot: resolution never mutates anything and never caches
//! across builds. Relative specifiers resolve against the referrer's
//! directory; bare and absolute specifiers against the configured roots in
//! order. Extension probing follows the configured order and the first
//! existing candidate wins; two candidates at equal priority are an
//! ambiguity, not a race the declaration order happens to win.

use std::fs;
use std::path::{Path, PathBuf};

use bindle_config::ResolveConfig;
use path_clean::PathClean;

use crate::error::ResolveError;
use crate::module::ModuleId;

/// Resolves module specifiers to concrete file identities.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
}

impl AssetResolver {
    /// Build a resolver from config, falling back to `default_root` when no
    /// roots are configured. Roots are made absolute against `default_root`.
    pub fn new(config: &ResolveConfig, default_root: &Path) -> Self {
        let mut roots: Vec<PathBuf> = config
            .roots
            .iter()
            .map(|r| absolutize(r, default_root))
            .collect();
        if roots.is_empty() {
            roots.push(default_root.to_path_buf().clean());
        }
        // Resolved identities are canonical, so roots must be too or
        // root-relative display names never strip cleanly.
        for root in &mut roots {
            if let Ok(canonical) = fs::canonicalize(root.as_path()) {
                *root = canonical;
            }
        }
        Self {
            roots,
            extensions: config.extensions.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    /// The first configured root. Module keys in emitted bundles are made
    /// relative to this.
    pub fn primary_root(&self) -> &Path {
        &self.roots[0]
    }

    /// Resolve a specifier to a canonical file identity.
    pub fn resolve(
        &self,
        from: Option<&ModuleId>,
        specifier: &str,
    ) -> Result<ModuleId, ResolveError> {
        let bases = self.bases_for(from, specifier);
        let mut searched = Vec::new();

        if self.has_recognized_extension(specifier) {
            // Exact probe, no extension search.
            let found = self.probe(&bases, specifier, "", &mut searched)?;
            if let Some(id) = found {
                return Ok(id);
            }
        } else {
            for ext in &self.extensions {
                if let Some(id) = self.probe(&bases, specifier, ext, &mut searched)? {
                    return Ok(id);
                }
            }
            // A specifier with an unrecognized extension (e.g. `logo.png`)
            // still names a real file; probe it verbatim as a last resort.
            if Path::new(specifier).extension().is_some() {
                if let Some(id) = self.probe(&bases, specifier, "", &mut searched)? {
                    return Ok(id);
                }
            }
        }

        Err(ResolveError::NotFound {
            specifier: specifier.to_string(),
            from: from.map(|id| id.path().to_path_buf()),
            searched,
        })
    }

    /// Whether an identity sits inside an excluded directory.
    ///
    /// Excluded trees are opaque to dependency discovery: the referenced file
    /// itself is a legal leaf, but its own imports are never scanned.
    pub fn is_opaque(&self, id: &ModuleId) -> bool {
        id.path().components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.exclude_dirs.iter().any(|d| d == name.as_ref())
        })
    }

    fn bases_for(&self, from: Option<&ModuleId>, specifier: &str) -> Vec<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = from
                .and_then(|id| id.path().parent())
                .unwrap_or_else(|| self.primary_root())
                .to_path_buf();
            vec![base]
        } else if Path::new(specifier).is_absolute() {
            // Absolute specifiers carry their own base.
            vec![PathBuf::new()]
        } else {
            self.roots.clone()
        }
    }

    fn has_recognized_extension(&self, specifier: &str) -> bool {
        self.extensions.iter().any(|ext| specifier.ends_with(ext.as_str()))
    }

    /// Probe `specifier + ext` under every base at this priority level.
    /// Exactly one hit resolves; several are ambiguous.
    fn probe(
        &self,
        bases: &[PathBuf],
        specifier: &str,
        ext: &str,
        searched: &mut Vec<PathBuf>,
    ) -> Result<Option<ModuleId>, ResolveError> {
        let mut hits = Vec::new();
        for base in bases {
            let candidate = base.join(format!("{specifier}{ext}")).clean();
            if candidate.is_file() {
                hits.push(candidate);
            } else {
                searched.push(candidate);
            }
        }

        match hits.len() {
            0 => Ok(None),
            1 => {
                let path = hits.pop().expect("one hit");
                self.check_case_collision(&path, specifier)?;
                Ok(Some(canonical_id(&path, specifier)?))
            }
            _ => Err(ResolveError::Ambiguous {
                specifier: specifier.to_string(),
                candidates: hits,
            }),
        }
    }

    /// A sibling differing from the hit only by case resolves equally on
    /// case-insensitive filesystems, so report it as ambiguous everywhere.
    fn check_case_collision(&self, path: &Path, specifier: &str) -> Result<(), ResolveError> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Ok(());
        };
        let name = name.to_string_lossy();
        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            // Parent readable enough to hit the file; treat listing failure
            // as no collision rather than failing the build.
            Err(_) => return Ok(()),
        };

        let mut collisions = Vec::new();
        for entry in entries.flatten() {
            let other = entry.file_name();
            let other = other.to_string_lossy();
            if other.eq_ignore_ascii_case(&name) {
                collisions.push(parent.join(other.as_ref()));
            }
        }
        if collisions.len() > 1 {
            return Err(ResolveError::Ambiguous {
                specifier: specifier.to_string(),
                candidates: collisions,
            });
        }
        Ok(())
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        base.join(path).clean()
    }
}

fn canonical_id(path: &Path, specifier: &str) -> Result<ModuleId, ResolveError> {
    // Canonicalize for real symlink resolution; the cleaned absolute path is
    // the fallback when the filesystem refuses (still deterministic within
    // one snapshot).
    let canonical = fs::canonicalize(path).or_else(|e| {
        if path.is_absolute() {
            Ok(path.to_path_buf().clean())
        } else {
            Err(ResolveError::Io {
                specifier: specifier.to_string(),
                source: e,
            })
        }
    })?;
    Ok(ModuleId::new(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver_in(dir: &TempDir) -> AssetResolver {
        AssetResolver::new(&ResolveConfig::default(), dir.path())
    }

    #[test]
    fn resolves_relative_with_probed_extension() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.js"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("src/index.js"), "").unwrap();

        let resolver = resolver_in(&dir);
        let from = resolver.resolve(None, "./src/index.js").unwrap();
        let id = resolver.resolve(Some(&from), "./a").unwrap();
        assert!(id.path().ends_with("src/a.js"));
    }

    #[test]
    fn missing_module_reports_searched_paths() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir);
        let err = resolver.resolve(None, "./nope").unwrap_err();
        match err {
            ResolveError::NotFound {
                specifier,
                searched,
                ..
            } => {
                assert_eq!(specifier, "./nope");
                assert!(!searched.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bare_specifier_resolves_against_roots_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("first")).unwrap();
        fs::create_dir(dir.path().join("second")).unwrap();
        fs::write(dir.path().join("second/util.js"), "").unwrap();

        let config = ResolveConfig {
            roots: vec![dir.path().join("first"), dir.path().join("second")],
            ..ResolveConfig::default()
        };
        let resolver = AssetResolver::new(&config, dir.path());
        let id = resolver.resolve(None, "util").unwrap();
        assert!(id.path().ends_with("second/util.js"));
    }

    #[test]
    fn equal_priority_hits_are_ambiguous() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("first")).unwrap();
        fs::create_dir(dir.path().join("second")).unwrap();
        fs::write(dir.path().join("first/util.js"), "").unwrap();
        fs::write(dir.path().join("second/util.js"), "").unwrap();

        let config = ResolveConfig {
            roots: vec![dir.path().join("first"), dir.path().join("second")],
            ..ResolveConfig::default()
        };
        let resolver = AssetResolver::new(&config, dir.path());
        assert!(matches!(
            resolver.resolve(None, "util"),
            Err(ResolveError::Ambiguous { .. })
        ));
    }

    #[test]
    fn unrecognized_extension_probes_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, 0x50]).unwrap();
        let resolver = resolver_in(&dir);
        let id = resolver.resolve(None, "./logo.png").unwrap();
        assert!(id.path().ends_with("logo.png"));
    }

    #[test]
    fn excluded_directories_are_opaque() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
        fs::write(dir.path().join("node_modules/dep/index.js"), "").unwrap();

        let resolver = resolver_in(&dir);
        let id = resolver.resolve(None, "./node_modules/dep/index.js").unwrap();
        assert!(resolver.is_opaque(&id));

        let plain = ModuleId::new(dir.path().join("src.js").clean());
        assert!(!resolver.is_opaque(&plain));
    }
}
