//! # Backend Selection
//!
//! Resolves which backend is active from the settings store and decides
//! whether sync may run right now (connectivity, metered connections).
//! Switching providers wipes the old provider's id mappings so stale
//! cross-backend pointers cannot survive the switch.

use crate::backend::{SyncBackend, UnimplementedBackend};
use crate::error::Result;
use bridge_traits::network::NetworkMonitor;
use bridge_traits::storage::SettingsStore;
use core_notes::repositories::IdMappingRepository;
use core_notes::Provider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Settings keys the sync subsystem reads.
pub mod keys {
    /// Active provider tag, one of the [`core_notes::Provider`] strings.
    pub const SYNC_PROVIDER: &str = "sync.provider";
    /// Whether the periodic background cycle runs.
    pub const SYNC_BACKGROUND_ENABLED: &str = "sync.background_enabled";
    /// Whether sync may use metered connections.
    pub const SYNC_ON_METERED: &str = "sync.on_metered";
}

/// Chooses the active backend and gates sync on connectivity.
pub struct BackendSelector {
    settings: Arc<dyn SettingsStore>,
    network: Option<Arc<dyn NetworkMonitor>>,
    backends: RwLock<HashMap<Provider, Arc<dyn SyncBackend>>>,
}

impl BackendSelector {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        network: Option<Arc<dyn NetworkMonitor>>,
    ) -> Self {
        Self {
            settings,
            network,
            backends: RwLock::new(HashMap::new()),
        }
    }

    /// The settings store backing this selector.
    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Register a working backend implementation, keyed by its provider.
    pub fn register(&self, backend: Arc<dyn SyncBackend>) {
        let provider = backend.kind();
        debug!(%provider, "Registering sync backend");
        let mut backends = self.backends.write().unwrap_or_else(|e| e.into_inner());
        backends.insert(provider, backend);
    }

    /// The provider configured in settings, `Disabled` when unset or
    /// unparseable.
    pub async fn active_provider(&self) -> Result<Provider> {
        let stored = self.settings.get_string(keys::SYNC_PROVIDER).await?;
        Ok(stored
            .as_deref()
            .and_then(Provider::parse)
            .unwrap_or(Provider::Disabled))
    }

    /// The backend for the configured provider.
    ///
    /// `None` when sync is disabled. Providers that are declared but have no
    /// registered implementation resolve to a placeholder whose operations
    /// all fail with a not-implemented error.
    pub async fn active_backend(&self) -> Result<Option<Arc<dyn SyncBackend>>> {
        let provider = self.active_provider().await?;
        if provider == Provider::Disabled {
            return Ok(None);
        }

        let registered = {
            let backends = self.backends.read().unwrap_or_else(|e| e.into_inner());
            backends.get(&provider).cloned()
        };

        Ok(Some(registered.unwrap_or_else(|| {
            Arc::new(UnimplementedBackend::new(provider)) as Arc<dyn SyncBackend>
        })))
    }

    /// Whether a sync cycle may run right now.
    ///
    /// The filesystem backend never needs connectivity; server backends are
    /// gated on connection state and the metered-connection preference.
    pub async fn sync_allowed(&self) -> Result<bool> {
        let provider = self.active_provider().await?;
        match provider {
            Provider::Disabled => return Ok(false),
            Provider::FileStorage => return Ok(true),
            _ => {}
        }

        let Some(network) = &self.network else {
            return Ok(true);
        };

        if !network.is_connected().await {
            debug!(%provider, "Sync blocked, no network connection");
            return Ok(false);
        }

        if network.is_metered().await {
            let on_metered = self
                .settings
                .get_bool(keys::SYNC_ON_METERED)
                .await?
                .unwrap_or(false);
            if !on_metered {
                debug!(%provider, "Sync blocked on metered connection");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Switch the active provider, clearing the outgoing provider's
    /// mappings.
    pub async fn set_active_provider(
        &self,
        provider: Provider,
        mappings: &dyn IdMappingRepository,
    ) -> Result<()> {
        let previous = self.active_provider().await?;
        if previous != provider && previous != Provider::Disabled {
            let cleared = mappings.delete_by_provider(previous).await?;
            info!(%previous, %provider, cleared, "Switched sync provider");
        }

        self.settings
            .set_string(keys::SYNC_PROVIDER, provider.as_str())
            .await?;
        Ok(())
    }
}
