//! # Core Configuration
//!
//! [`CoreConfig`] is the host application's contract with the core: it
//! carries the injected platform bridges, the database location, and the
//! sync timing knobs. The builder fails fast with an actionable message
//! when a required capability is missing, so a misassembled host crashes
//! at startup instead of at first sync.
//!
//! Only the `SettingsStore` is mandatory. The HTTP client, filesystem
//! access, and network monitor are optional because each matters only for
//! the sync providers (or features) that use it.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/notes.db")
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, NetworkMonitor, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything the core needs from its host. Built via [`CoreConfigBuilder`].
#[derive(Clone)]
pub struct CoreConfig {
    /// SQLite database file for notes and id mappings.
    pub database_path: PathBuf,

    /// Needed when a server-backed sync provider is active.
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Needed when the folder-backed sync provider is active.
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    /// User preferences and provider credentials.
    pub settings_store: Arc<dyn SettingsStore>,

    /// Connectivity and metered-network detection.
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub features: FeatureFlags,

    /// Timing knobs for the sync subsystem.
    pub sync_tuning: SyncTuning,
}

impl std::fmt::Debug for CoreConfig {
    // Trait objects have no Debug, so bridges print as present/absent.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("http_client", &self.http_client.is_some())
            .field("file_system", &self.file_system.is_some())
            .field("settings_store", &true)
            .field("network_monitor", &self.network_monitor.is_some())
            .field("features", &self.features)
            .field("sync_tuning", &self.sync_tuning)
            .finish()
    }
}

/// Optional behaviors the host can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Run periodic background sync cycles.
    pub enable_background_sync: bool,

    /// Consult the network monitor before syncing. Requires one.
    pub enable_network_awareness: bool,
}

/// Timing configuration for the sync subsystem.
///
/// Controls how long the dispatcher waits before pushing coalesced edits
/// and how long a backend availability probe result stays cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTuning {
    /// Delay between an edit being submitted and the push starting.
    /// Rapid successive edits within this window collapse into one push.
    pub dispatch_debounce: Duration,

    /// How long a backend availability probe result is considered fresh.
    pub availability_ttl: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            dispatch_debounce: Duration::from_millis(500),
            availability_ttl: Duration::from_secs(30),
        }
    }
}

impl SyncTuning {
    /// Validates the tuning values.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_debounce > Duration::from_secs(60) {
            return Err(Error::Config(
                "Dispatch debounce exceeds maximum of 60 seconds".to_string(),
            ));
        }

        if self.availability_ttl.is_zero() {
            return Err(Error::Config(
                "Availability TTL must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks the path, the tuning bounds, and that every enabled feature
    /// has the bridge it depends on.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.sync_tuning.validate()?;

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "a SettingsStore is needed for user preferences and sync \
                 provider selection; on desktop inject \
                 bridge_desktop::SqliteSettingsStore, on mobile the \
                 platform-native settings (UserDefaults/DataStore)"
            .to_string(),
    }
}

/// Incremental builder for [`CoreConfig`]; `build()` runs full validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    features: FeatureFlags,
    sync_tuning: Option<SyncTuning>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Required when a server-backed sync provider (Nextcloud) is active.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Required when the folder-backed sync provider is active.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Required. Persists preferences, credentials references, and the
    /// active sync provider.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Lets sync pause on disconnect or metered networks.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Off by default.
    pub fn enable_background_sync(mut self, enabled: bool) -> Self {
        self.features.enable_background_sync = enabled;
        self
    }

    /// Off by default; requires a `NetworkMonitor` at build time.
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn sync_tuning(mut self, tuning: SyncTuning) -> Self {
        self.sync_tuning = Some(tuning);
        self
    }

    /// Finishes the build, erroring with a pointed message when a required
    /// piece is missing or a value is out of bounds.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let settings_store = self.settings_store.ok_or_else(settings_store_missing_error)?;

        let config = CoreConfig {
            database_path,
            http_client: self.http_client,
            file_system: self.file_system,
            settings_store,
            network_monitor: self.network_monitor,
            features: self.features,
            sync_tuning: self.sync_tuning.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::SettingsStore;
    use mockall::mock;
    use std::sync::Arc;

    mock! {
        Settings {}

        #[async_trait]
        impl SettingsStore for Settings {
            async fn set_string(&self, key: &str, value: &str) -> bridge_traits::error::Result<()>;
            async fn get_string(&self, key: &str) -> bridge_traits::error::Result<Option<String>>;
            async fn set_bool(&self, key: &str, value: bool) -> bridge_traits::error::Result<()>;
            async fn get_bool(&self, key: &str) -> bridge_traits::error::Result<Option<bool>>;
            async fn set_i64(&self, key: &str, value: i64) -> bridge_traits::error::Result<()>;
            async fn get_i64(&self, key: &str) -> bridge_traits::error::Result<Option<i64>>;
            async fn delete(&self, key: &str) -> bridge_traits::error::Result<()>;
            async fn list_keys(&self) -> bridge_traits::error::Result<Vec<String>>;
        }
    }

    // The builder never touches the store, so a bare mock suffices.
    fn settings() -> Arc<MockSettings> {
        Arc::new(MockSettings::new())
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .settings_store(settings())
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_builder_requires_settings_store() {
        let result = CoreConfig::builder().database_path("/db/notes.db").build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("SettingsStore"));
        assert!(err_msg.contains("user preferences"));
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let result = CoreConfig::builder()
            .database_path("/db/notes.db")
            .settings_store(settings())
            .build();

        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.database_path, PathBuf::from("/db/notes.db"));
        assert_eq!(config.sync_tuning, SyncTuning::default());
    }

    #[test]
    fn test_validate_rejects_excessive_debounce() {
        let result = CoreConfig::builder()
            .database_path("/db/notes.db")
            .settings_store(settings())
            .sync_tuning(SyncTuning {
                dispatch_debounce: Duration::from_secs(120),
                ..SyncTuning::default()
            })
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_rejects_zero_availability_ttl() {
        let result = CoreConfig::builder()
            .database_path("/db/notes.db")
            .settings_store(settings())
            .sync_tuning(SyncTuning {
                availability_ttl: Duration::ZERO,
                ..SyncTuning::default()
            })
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("greater than zero"));
    }

    #[test]
    fn test_validate_network_awareness_requires_monitor() {
        let result = CoreConfig::builder()
            .database_path("/db/notes.db")
            .settings_store(settings())
            .enable_network_awareness(true)
            .build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Network awareness enabled"));
        assert!(err_msg.contains("NetworkMonitor"));
    }

    #[test]
    fn test_feature_flags_default() {
        let flags = FeatureFlags::default();
        assert!(!flags.enable_background_sync);
        assert!(!flags.enable_network_awareness);
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder()
            .database_path("/db/notes.db")
            .settings_store(settings())
            .build()
            .unwrap();

        let cloned = config.clone();
        assert_eq!(cloned.database_path, config.database_path);
        assert_eq!(cloned.sync_tuning, config.sync_tuning);
    }
}
