//! Atomic output-tree writing.
//!
//! Every artifact is already in memory by the time this runs, so the write
//! phase is short and mechanical: validate every target path stays inside
//! the output directory, clear the directory when configured to, write each
//! artifact to a temp file, then rename into place. Rename is atomic on the
//! filesystems we care about, and a failure anywhere rolls back the temp
//! files, so a partial tree is never left looking like a finished build.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::debug;

use crate::emit::Artifact;
use crate::error::EmissionError;

pub(crate) fn write_artifacts(
    artifacts: &[Artifact],
    dir: &Path,
    clean: bool,
) -> Result<(), EmissionError> {
    let dir = normalize_dir(dir)?;

    let mut targets = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        targets.push(validate_target(&dir, &artifact.filename)?);
    }

    if clean && dir.exists() {
        fs::remove_dir_all(&dir).map_err(|source| EmissionError::Io {
            path: dir.clone(),
            source,
        })?;
    }
    fs::create_dir_all(&dir).map_err(|source| EmissionError::Io {
        path: dir.clone(),
        source,
    })?;

    write_atomic(artifacts, &targets)?;
    debug!(count = artifacts.len(), dir = %dir.display(), "artifacts written");
    Ok(())
}

fn normalize_dir(dir: &Path) -> Result<PathBuf, EmissionError> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }
    let cwd = std::env::current_dir().map_err(|source| EmissionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Join and re-clean, then require the result to still sit under the output
/// directory. Rejects traversal (`../x`), absolute names, and null bytes.
fn validate_target(dir: &Path, filename: &str) -> Result<PathBuf, EmissionError> {
    if filename.contains('\0') || filename.is_empty() {
        return Err(EmissionError::OutputEscape {
            filename: filename.to_string(),
        });
    }
    let full = dir.join(Path::new(filename).clean()).clean();
    if !full.starts_with(dir) || full == dir {
        return Err(EmissionError::OutputEscape {
            filename: filename.to_string(),
        });
    }
    Ok(full)
}

fn write_atomic(artifacts: &[Artifact], targets: &[PathBuf]) -> Result<(), EmissionError> {
    let mut temp_files: Vec<(PathBuf, &PathBuf)> = Vec::with_capacity(targets.len());

    for (artifact, target) in artifacts.iter().zip(targets) {
        if let Some(parent) = target.parent() {
            if let Err(source) = fs::create_dir_all(parent) {
                rollback(&temp_files);
                return Err(EmissionError::Io {
                    path: parent.to_path_buf(),
                    source,
                });
            }
        }
        let temp = temp_path(target);
        if let Err(source) = fs::write(&temp, &artifact.bytes) {
            rollback(&temp_files);
            return Err(EmissionError::Io { path: temp, source });
        }
        temp_files.push((temp, target));
    }

    for (temp, target) in &temp_files {
        if let Err(source) = fs::rename(temp, target) {
            rollback(&temp_files);
            return Err(EmissionError::Io {
                path: (*target).clone(),
                source,
            });
        }
    }
    Ok(())
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Best-effort temp cleanup; already in an error state, so failures here are
/// only logged.
fn rollback(temp_files: &[(PathBuf, &PathBuf)]) {
    for (temp, _) in temp_files {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                debug!(path = %temp.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::ArtifactKind;
    use tempfile::TempDir;

    fn artifact(filename: &str, bytes: &[u8]) -> Artifact {
        Artifact {
            name: filename.to_string(),
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            kind: ArtifactKind::Bundle,
        }
    }

    #[test]
    fn writes_nested_artifacts() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        write_artifacts(
            &[
                artifact("index.abc.js", b"bundle"),
                artifact("assets/x.png", b"png"),
            ],
            &out,
            true,
        )
        .unwrap();
        assert_eq!(fs::read(out.join("index.abc.js")).unwrap(), b"bundle");
        assert_eq!(fs::read(out.join("assets/x.png")).unwrap(), b"png");
    }

    #[test]
    fn clean_removes_stale_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.js"), b"old").unwrap();

        write_artifacts(&[artifact("fresh.js", b"new")], &out, true).unwrap();
        assert!(!out.join("stale.js").exists());
        assert!(out.join("fresh.js").exists());
    }

    #[test]
    fn clean_disabled_keeps_existing_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("keep.js"), b"old").unwrap();

        write_artifacts(&[artifact("fresh.js", b"new")], &out, false).unwrap();
        assert!(out.join("keep.js").exists());
    }

    #[test]
    fn traversal_is_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        let err = write_artifacts(
            &[artifact("../escape.js", b"nope")],
            &out,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, EmissionError::OutputEscape { .. }));
        // Validation happens before the directory is created or cleared.
        assert!(!out.exists());
    }

    #[test]
    fn no_temp_files_survive_success() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist");
        write_artifacts(&[artifact("a.js", b"a")], &out, true).unwrap();
        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
