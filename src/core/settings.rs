// src/core/settings.rs

//! User settings from `config.toml`, overridable per invocation.
//!
//! ```toml
//! prefix = "IOC_TEST"
//! axis_id = 1
//! timeout = 2.0
//! catalog = "~/ecmc/ecmc_commands.json"
//!
//! [transport]
//! caget = "caget"
//! caput = "caput"
//! ```

use crate::{
    constants::{
        DEFAULT_BLOCKLIST_FILENAME, DEFAULT_CATALOG_FILENAME, DEFAULT_CONTROLLER_CATALOG_FILENAME,
        DEFAULT_FAVORITES_FILENAME, DEFAULT_TIMEOUT_SECS,
    },
    core::{
        dispatcher::Endpoint,
        paths::{self, PathError},
    },
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Failures loading or interpreting settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid TOML.
    #[error("Failed to parse settings '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// The timeout is not a usable duration.
    #[error("Timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
    /// Neither a prefix nor the named PV is configured.
    #[error("No IOC prefix is set, so the {0} PV must be given explicitly")]
    MissingEndpoint(&'static str),
    /// A configured path could not be resolved.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// External Channel Access tools used for PV access.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TransportSettings {
    /// `caget` command line, program plus fixed arguments.
    pub caget: Option<String>,
    /// `caput` command line, program plus fixed arguments.
    pub caput: Option<String>,
}

/// Settings from `config.toml`. Unset values fall back to defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    /// IOC prefix, e.g. `IOC_TEST`.
    pub prefix: Option<String>,
    /// Explicit command PV, replacing `<prefix>:MCU-Cmd.AOUT`.
    pub cmd_pv: Option<String>,
    /// Explicit readback PV, replacing `<prefix>:MCU-Cmd.AINP`. Empty means write-only.
    pub qry_pv: Option<String>,
    /// Default axis for `probe` and `resolve`.
    pub axis_id: Option<u32>,
    /// Seconds.
    pub timeout: Option<f64>,
    /// Catalog path. `~` and environment variables are expanded.
    pub catalog: Option<String>,
    /// Controller-tuning catalog path.
    pub controller_catalog: Option<String>,
    /// Favorites store path.
    pub favorites: Option<String>,
    /// Blocklist path.
    pub blocklist: Option<String>,
    /// CA tool command lines.
    pub transport: TransportSettings,
}

impl Settings {
    /// Loads `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at '{}', using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text, path)
    }

    /// Parses settings text. `path` only labels errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Field-wise merge; values set in `overrides` win.
    pub fn merged_with(self, overrides: Self) -> Self {
        Self {
            prefix: overrides.prefix.or(self.prefix),
            cmd_pv: overrides.cmd_pv.or(self.cmd_pv),
            qry_pv: overrides.qry_pv.or(self.qry_pv),
            axis_id: overrides.axis_id.or(self.axis_id),
            timeout: overrides.timeout.or(self.timeout),
            catalog: overrides.catalog.or(self.catalog),
            controller_catalog: overrides.controller_catalog.or(self.controller_catalog),
            favorites: overrides.favorites.or(self.favorites),
            blocklist: overrides.blocklist.or(self.blocklist),
            transport: TransportSettings {
                caget: overrides.transport.caget.or(self.transport.caget),
                caput: overrides.transport.caput.or(self.transport.caput),
            },
        }
    }

    /// The trimmed IOC prefix, empty when unset.
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().map(str::trim).unwrap_or_default()
    }

    /// The configured timeout, rejecting zero, negative and out-of-range values.
    pub fn timeout(&self) -> Result<Duration, SettingsError> {
        let secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !secs.is_finite() || secs <= 0.0 {
            return Err(SettingsError::InvalidTimeout(secs));
        }
        Duration::try_from_secs_f64(secs).map_err(|_| SettingsError::InvalidTimeout(secs))
    }

    /// Command/readback PV pair. Without a prefix both PVs must be configured,
    /// otherwise commands would go to a bare `MCU-Cmd.AOUT`.
    pub fn endpoint(&self) -> Result<Endpoint, SettingsError> {
        if self.prefix().is_empty() {
            if self.cmd_pv.as_deref().is_none_or(|pv| pv.trim().is_empty()) {
                return Err(SettingsError::MissingEndpoint("command"));
            }
            if self.qry_pv.is_none() {
                return Err(SettingsError::MissingEndpoint("query"));
            }
        }
        Ok(Endpoint::from_prefix(
            self.prefix(),
            self.cmd_pv.as_deref(),
            self.qry_pv.as_deref(),
        ))
    }

    /// Base catalog, defaulting to the config directory.
    pub fn catalog_path(&self) -> Result<PathBuf, SettingsError> {
        resolve(self.catalog.as_deref(), DEFAULT_CATALOG_FILENAME)
    }

    /// Controller-tuning catalog, defaulting to the config directory.
    pub fn controller_catalog_path(&self) -> Result<PathBuf, SettingsError> {
        resolve(self.controller_catalog.as_deref(), DEFAULT_CONTROLLER_CATALOG_FILENAME)
    }

    /// Favorites store, defaulting to the config directory.
    pub fn favorites_path(&self) -> Result<PathBuf, SettingsError> {
        resolve(self.favorites.as_deref(), DEFAULT_FAVORITES_FILENAME)
    }

    /// Blocklist, defaulting to the config directory.
    pub fn blocklist_path(&self) -> Result<PathBuf, SettingsError> {
        resolve(self.blocklist.as_deref(), DEFAULT_BLOCKLIST_FILENAME)
    }
}

/// Expands a configured path, or falls back to `default_name` in the config directory.
fn resolve(configured: Option<&str>, default_name: &str) -> Result<PathBuf, SettingsError> {
    match configured.map(str::trim).filter(|p| !p.is_empty()) {
        Some(template) => Ok(paths::expand_path(template)?),
        None => Ok(paths::config_dir()?.join(default_name)),
    }
}
