//! Static file and directory copying.

use std::fs;
use std::path::Path;

use path_clean::PathClean;
use walkdir::WalkDir;

use crate::error::EmissionError;

/// Collect the contents of a static copy step into memory as
/// `(output-relative filename, bytes)` pairs.
///
/// A single file lands at `to/<file name>`; a directory is walked
/// recursively with structure preserved under `to`. Entries come back in
/// sorted traversal order so artifact lists are deterministic. A missing
/// source is fatal, checked here before anything touches the output tree.
pub(crate) fn collect(from: &Path, to: &Path) -> Result<Vec<(String, Vec<u8>)>, EmissionError> {
    if !from.exists() {
        return Err(EmissionError::CopySourceMissing {
            path: from.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    if from.is_file() {
        let name = from.file_name().unwrap_or_default();
        files.push((relative_name(&to.join(name)), read(from)?));
        return Ok(files);
    }

    for entry in WalkDir::new(from)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(from)
            .unwrap_or_else(|_| entry.path());
        files.push((relative_name(&to.join(rel)), read(entry.path())?));
    }
    Ok(files)
}

fn read(path: &Path) -> Result<Vec<u8>, EmissionError> {
    fs::read(path).map_err(|source| EmissionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Cleaned, forward-slash, output-relative name.
fn relative_name(path: &Path) -> String {
    path.clean()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn missing_source_is_fatal() {
        let err = collect(Path::new("/no/such/thing"), Path::new("")).unwrap_err();
        assert!(matches!(err, EmissionError::CopySourceMissing { .. }));
    }

    #[test]
    fn single_file_lands_under_to() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("favicon.ico"), b"icon").unwrap();

        let files = collect(&dir.path().join("favicon.ico"), Path::new(".")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "favicon.ico");
        assert_eq!(files[0].1, b"icon");
    }

    #[test]
    fn directory_is_walked_with_structure_preserved() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("images/icons")).unwrap();
        fs::write(dir.path().join("images/logo.png"), b"logo").unwrap();
        fs::write(dir.path().join("images/icons/x.png"), b"x").unwrap();

        let files = collect(&dir.path().join("images"), &PathBuf::from("images")).unwrap();
        let names: Vec<_> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["images/icons/x.png", "images/logo.png"]);
    }
}
