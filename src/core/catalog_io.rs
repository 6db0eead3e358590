// src/core/catalog_io.rs

//! Reading and writing catalog JSON files and the command blocklist.

use crate::models::{Catalog, CatalogFile};
use log::{debug, warn};
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Failures reading or writing catalog, favorites and blocklist files.
#[derive(Error, Debug)]
pub enum CatalogIoError {
    /// The file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid catalog.
    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Serialization failed.
    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The temporary file could not be written.
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The temporary file could not replace the target.
    #[error("Failed to replace '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Accepted on-disk shapes: the full envelope or a bare array of commands.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogShape {
    Bare(Catalog),
    Envelope(CatalogFile),
}

/// Accepted blocklist shapes: a bare array or `{ "commands": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BlocklistShape {
    Bare(Vec<String>),
    Wrapped { commands: Vec<String> },
}

/// Parses catalog JSON. `path` only labels errors.
pub fn parse_catalog(text: &str, path: &Path) -> Result<CatalogFile, CatalogIoError> {
    let shape: CatalogShape = serde_json::from_str(text).map_err(|source| CatalogIoError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = match shape {
        CatalogShape::Envelope(file) => file,
        CatalogShape::Bare(catalog) => CatalogFile::new(catalog),
    };
    // Hand-edited files may carry duplicates; keep the first of each name.
    let commands = std::mem::take(&mut file.commands);
    file.commands = Catalog::from_commands(commands.commands().to_vec());
    if file.command_count != file.commands.len() {
        debug!(
            "Catalog '{}' declares {} command(s) but holds {}",
            path.display(),
            file.command_count,
            file.commands.len()
        );
        file.command_count = file.commands.len();
    }
    Ok(file)
}

/// Loads a catalog file from disk.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, CatalogIoError> {
    let text = fs::read_to_string(path).map_err(|source| CatalogIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_catalog(&text, path)?;
    debug!("Loaded {} command(s) from '{}'", file.commands.len(), path.display());
    Ok(file)
}

/// Pretty JSON with a trailing newline. Stable for identical input.
pub fn to_json(file: &CatalogFile) -> Result<String, CatalogIoError> {
    let mut text = serde_json::to_string_pretty(file)?;
    text.push('\n');
    Ok(text)
}

/// Serializes `file` and atomically replaces `path` with it.
pub fn save_catalog(path: &Path, file: &CatalogFile) -> Result<(), CatalogIoError> {
    let text = to_json(file)?;
    write_atomic(path, text.as_bytes())
}

/// Writes `bytes` to a temporary file next to `path`, then renames it over `path`.
/// Readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CatalogIoError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let write_err = |source| CatalogIoError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(&parent).map_err(write_err)?;
    let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    temp.flush().map_err(write_err)?;
    temp.persist(path).map_err(|source| CatalogIoError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Wrote {} byte(s) to '{}'", bytes.len(), path.display());
    Ok(())
}

/// Loads the list of blocked command names. A missing file means nothing is
/// blocked; an unreadable one is reported and also treated as empty.
pub fn load_blocklist(path: &Path) -> Vec<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Ignoring blocklist '{}': {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<BlocklistShape>(&text) {
        Ok(BlocklistShape::Bare(commands)) | Ok(BlocklistShape::Wrapped { commands }) => commands
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        Err(e) => {
            warn!("Ignoring malformed blocklist '{}': {}", path.display(), e);
            Vec::new()
        }
    }
}
