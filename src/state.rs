// src/state.rs

//! Per-invocation application context shared by the CLI handlers.
//!
//! Settings are resolved once at startup. Everything that touches the disk or
//! the network (the PV client, catalogs, the blocklist) is created lazily on
//! first use, so an action only pays for what it needs.

use crate::{
    core::{
        catalog_filter::FilterPolicy,
        catalog_io,
        dispatcher::DispatcherRegistry,
        favorites::FavoritesStore,
        pv::PvClient,
        settings::Settings,
    },
    models::CatalogFile,
    system::ca_client::CaCliClient,
};
use anyhow::{Context, Result};
use log::debug;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

/// Settings plus the lazily created services every handler shares.
#[derive(Debug)]
pub struct AppContext {
    settings: Settings,
    client: OnceLock<Arc<dyn PvClient>>,
    registry: OnceLock<DispatcherRegistry>,
    blocklist: OnceLock<FilterPolicy>,
}

impl AppContext {
    /// A context that uses the CA command-line tools for PV access.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
            registry: OnceLock::new(),
            blocklist: OnceLock::new(),
        }
    }

    /// A context whose PV access goes through `client` instead of the CA tools.
    pub fn with_client(settings: Settings, client: Arc<dyn PvClient>) -> Self {
        let context = Self::new(settings);
        let _ = context.client.set(client);
        context
    }

    /// The merged settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Result<Duration> {
        Ok(self.settings.timeout()?)
    }

    /// The PV client, built from the `[transport]` settings on first use.
    pub fn pv_client(&self) -> Result<Arc<dyn PvClient>> {
        if let Some(client) = self.client.get() {
            return Ok(Arc::clone(client));
        }
        let transport = &self.settings.transport;
        let client: Arc<dyn PvClient> = match (&transport.caget, &transport.caput) {
            (None, None) => Arc::new(CaCliClient::default()),
            (caget, caput) => Arc::new(
                CaCliClient::new(
                    caget.as_deref().unwrap_or("caget"),
                    caput.as_deref().unwrap_or("caput"),
                )
                .context(t!("state.error.transport_config"))?,
            ),
        };
        debug!("Using PV client {:?}", client);
        Ok(Arc::clone(self.client.get_or_init(|| client)))
    }

    /// Registry of dispatchers sharing one busy flag per endpoint.
    pub fn dispatchers(&self) -> Result<&DispatcherRegistry> {
        if let Some(registry) = self.registry.get() {
            return Ok(registry);
        }
        let client = self.pv_client()?;
        Ok(self.registry.get_or_init(|| DispatcherRegistry::new(client)))
    }

    /// Loads the base catalog, or the controller catalog when `controller` is set.
    pub fn load_catalog(&self, controller: bool) -> Result<CatalogFile> {
        let path = if controller {
            self.settings.controller_catalog_path()?
        } else {
            self.settings.catalog_path()?
        };
        catalog_io::load_catalog(&path)
            .with_context(|| format!(t!("state.error.catalog_load"), path = path.display()))
    }

    /// Deny-list built from the blocklist file. Missing file blocks nothing.
    pub fn blocklist(&self) -> Result<&FilterPolicy> {
        if let Some(policy) = self.blocklist.get() {
            return Ok(policy);
        }
        let path = self.settings.blocklist_path()?;
        let patterns = catalog_io::load_blocklist(&path);
        let policy = FilterPolicy::deny_list(patterns.as_slice())
            .with_context(|| format!(t!("state.error.blocklist_invalid"), path = path.display()))?;
        Ok(self.blocklist.get_or_init(|| policy))
    }

    /// True when the blocklist refuses `command_name`.
    pub fn is_blocked(&self, command_name: &str) -> Result<bool> {
        let probe = crate::models::CommandSpec::new(command_name, Vec::new());
        Ok(!self.blocklist()?.admits(&probe))
    }

    /// Loads the favorites store from the configured path.
    pub fn favorites(&self) -> Result<FavoritesStore> {
        let path = self.settings.favorites_path()?;
        FavoritesStore::load(&path)
            .with_context(|| format!(t!("state.error.favorites_load"), path = path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pv::testing::MemoryPv;
    use std::fs;
    use tempfile::tempdir;

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            prefix: Some("IOC".into()),
            catalog: Some(dir.join("ecmc_commands.json").display().to_string()),
            blocklist: Some(dir.join("blocklist.json").display().to_string()),
            favorites: Some(dir.join("favorites.json").display().to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_blocklist_is_loaded_lazily() {
        let dir = tempdir().unwrap();
        let context = AppContext::new(settings_in(dir.path()));
        fs::write(dir.path().join("blocklist.json"), r#"["EcApply*"]"#).unwrap();

        assert!(context.is_blocked("Cfg.EcApplyConfig").unwrap());
        assert!(!context.is_blocked("GetControllerError").unwrap());
    }

    #[test]
    fn test_missing_catalog_is_reported() {
        let dir = tempdir().unwrap();
        let context = AppContext::new(settings_in(dir.path()));
        let err = context.load_catalog(false).unwrap_err();
        assert!(format!("{:#}", err).contains("ecmc_commands.json"));
        assert!(context.favorites().unwrap().list().is_empty());
    }

    #[test]
    fn test_injected_client_is_used() {
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemoryPv::new().with("IOC:MCU-Cmd.AINP", "OK"));
        let context = AppContext::with_client(settings_in(dir.path()), memory.clone());

        let dispatcher = context.dispatchers().unwrap().dispatcher(context.settings().endpoint().unwrap());
        let result = dispatcher.dispatch_raw("GetControllerError()", context.timeout().unwrap());
        assert!(result.ok);
        assert_eq!(memory.writes().len(), 2);
    }
}
