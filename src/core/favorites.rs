// src/core/favorites.rs

//! Persistent list of saved command invocations.
//!
//! Every mutation is written through immediately with an atomic replace;
//! nothing is saved in the background.

use crate::{
    core::catalog_io::{self, CatalogIoError},
    models::Favorite,
};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Favorites persisted as a JSON array. Every change is saved at once.
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    path: PathBuf,
    items: Vec<Favorite>,
}

impl FavoritesStore {
    /// Loads the store at `path`. A missing file is an empty store; an
    /// unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, CatalogIoError> {
        let items = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| CatalogIoError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(CatalogIoError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        debug!("Loaded {} favorite(s) from '{}'", items.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            items,
        })
    }

    /// File the store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Favorites in insertion order.
    pub fn list(&self) -> &[Favorite] {
        &self.items
    }

    /// Favorite at zero-based `index`.
    pub fn get(&self, index: usize) -> Option<&Favorite> {
        self.items.get(index)
    }

    /// Appends `favorite` and saves. An identical entry is not added twice;
    /// returns whether the list changed.
    pub fn add(&mut self, favorite: Favorite) -> Result<bool, CatalogIoError> {
        if self.items.contains(&favorite) {
            return Ok(false);
        }
        info!("Adding favorite '{}'", favorite.command_name);
        self.items.push(favorite);
        self.save()?;
        Ok(true)
    }

    /// Removes the entry at `index` and saves. Returns the removed entry.
    pub fn remove(&mut self, index: usize) -> Result<Option<Favorite>, CatalogIoError> {
        if index >= self.items.len() {
            return Ok(None);
        }
        let removed = self.items.remove(index);
        info!("Removed favorite '{}'", removed.command_name);
        self.save()?;
        Ok(Some(removed))
    }

    /// Rewrites the file atomically.
    pub fn save(&self) -> Result<(), CatalogIoError> {
        let mut text = serde_json::to_string_pretty(&self.items)?;
        text.push('\n');
        catalog_io::write_atomic(&self.path, text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn favorite(name: &str, args: &[&str]) -> Favorite {
        Favorite {
            command_name: name.into(),
            argument_template: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_add_remove_persist_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ecmc_favorites.json");

        let mut store = FavoritesStore::load(&path).unwrap();
        assert!(store.list().is_empty());
        assert!(store.add(favorite("Cfg.SetAxisEnable", &["<axis>", "1"])).unwrap());
        assert!(!store.add(favorite("Cfg.SetAxisEnable", &["<axis>", "1"])).unwrap());
        assert!(store.add(favorite("GetControllerError", &[])).unwrap());

        let reloaded = FavoritesStore::load(&path).unwrap();
        assert_eq!(reloaded.list(), store.list());

        let removed = store.remove(0).unwrap().unwrap();
        assert_eq!(removed.command_name, "Cfg.SetAxisEnable");
        assert!(store.remove(5).unwrap().is_none());

        let reloaded = FavoritesStore::load(&path).unwrap();
        assert_eq!(reloaded.list().len(), 1);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"commandName\": \"GetControllerError\""));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ecmc_favorites.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            FavoritesStore::load(&path),
            Err(CatalogIoError::Parse { .. })
        ));
    }
}
