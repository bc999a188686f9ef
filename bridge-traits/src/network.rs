//! Network state abstraction
//!
//! Connectivity answers for sync gating: whether the device is online, and
//! whether the connection is one the user pays for by the megabyte.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    Cellular,
    WiFi,
    Ethernet,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    /// The platform cannot tell right now.
    Indeterminate,
}

/// One snapshot of the device's connectivity.
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// True when the connection carries data limits or per-use cost.
    pub is_metered: bool,
}

/// Answers the two questions the sync layer asks before starting work:
/// are we online, and is this connection metered.
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn may_sync(monitor: &dyn NetworkMonitor) -> bool {
///     match monitor.get_network_info().await {
///         Ok(info) => !info.is_metered,
///         Err(_) => false,
///     }
/// }
/// ```
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Convenience over [`get_network_info`](Self::get_network_info);
    /// errors and indeterminate states read as offline.
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Errors read as unmetered.
    async fn is_metered(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                is_metered: true,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_info() {
        let info = NetworkInfo {
            status: NetworkStatus::Connected,
            network_type: Some(NetworkType::WiFi),
            is_metered: false,
        };

        assert_eq!(info.status, NetworkStatus::Connected);
        assert_eq!(info.network_type, Some(NetworkType::WiFi));
        assert!(!info.is_metered);
    }
}
