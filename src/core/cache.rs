// src/core/cache.rs

//! Content hashing used to tell whether a derived catalog still matches the
//! base catalog it was produced from.

use crate::core::catalog_io::CatalogIoError;
use log::debug;
use std::{fs, path::Path};

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Truncated blake3 digest of `bytes`, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    hex::encode(hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default())
}

/// Hashes the current content of the file at `path`.
pub fn file_hash(path: &Path) -> Result<String, CatalogIoError> {
    let content = fs::read(path).map_err(|source| CatalogIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = content_hash(&content);
    debug!("Content hash of '{}' ({} bytes): {}", path.display(), content.len(), hash);
    Ok(hash)
}

/// Relation between a derived catalog and its base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The recorded hash matches the base file.
    Fresh,
    /// The base changed since the derived catalog was written.
    Stale { recorded: String, current: String },
    /// The derived file carries no source hash, e.g. it was written by hand.
    Unknown,
}

/// Compares the hash recorded in a derived catalog with the base file on disk.
pub fn check_freshness(base: &Path, recorded: Option<&str>) -> Result<Freshness, CatalogIoError> {
    let Some(recorded) = recorded else {
        return Ok(Freshness::Unknown);
    };
    let current = file_hash(base)?;
    if current == recorded {
        Ok(Freshness::Fresh)
    } else {
        Ok(Freshness::Stale {
            recorded: recorded.to_string(),
            current,
        })
    }
}
