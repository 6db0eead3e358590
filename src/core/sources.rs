// src/core/sources.rs

//! Loading of parser sources and header trees from disk.

use crate::core::catalog_io::CatalogIoError;
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// A text file fed to the scanner or the doc matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Display path, relative to the repository root when possible.
    pub path: String,
    /// Full file contents.
    pub text: String,
}

impl SourceFile {
    /// Reads `path`, labelling it relative to `root`. Invalid UTF-8 is replaced
    /// rather than rejected, since C sources occasionally carry Latin-1 comments.
    pub fn read(path: &Path, root: &Path) -> Result<Self, CatalogIoError> {
        let bytes = fs::read(path).map_err(|source| CatalogIoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: display_path(path, root),
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Collects every `*.h` below `root`, sorted by path so that downstream
/// "first documentation wins" is stable across runs.
pub fn collect_headers(root: &Path, display_root: &Path) -> Result<Vec<SourceFile>, CatalogIoError> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "h"))
        .collect();
    paths.sort();
    debug!("Found {} header(s) below '{}'", paths.len(), root.display());

    paths
        .iter()
        .map(|path| SourceFile::read(path, display_root))
        .collect()
}

/// Path relative to `root` with forward slashes, falling back to the simplified
/// absolute path.
pub fn display_path(path: &Path, root: &Path) -> String {
    let simplified = dunce::simplified(path);
    match simplified.strip_prefix(dunce::simplified(root)) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => simplified.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_headers_sorted_and_relative() {
        let dir = tempdir().unwrap();
        let sup = dir.path().join("devEcmcSup");
        fs::create_dir_all(sup.join("motion")).unwrap();
        fs::create_dir_all(sup.join("com")).unwrap();
        fs::write(sup.join("motion/ecmcAxis.h"), "/** b */").unwrap();
        fs::write(sup.join("com/ecmcCom.h"), "/** a */").unwrap();
        fs::write(sup.join("com/ecmcCmdParser.c"), "int x;").unwrap();

        let headers = collect_headers(&sup, dir.path()).unwrap();
        let paths: Vec<&str> = headers.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["devEcmcSup/com/ecmcCom.h", "devEcmcSup/motion/ecmcAxis.h"]
        );
    }

    #[test]
    fn test_read_missing_file_is_catalog_io_error() {
        let dir = tempdir().unwrap();
        let result = SourceFile::read(&dir.path().join("missing.c"), dir.path());
        assert!(matches!(result, Err(CatalogIoError::Read { .. })));
    }
}
