//! Desktop network monitor

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use tracing::debug;

/// [`NetworkMonitor`] using a TCP reachability probe against a public DNS
/// resolver. Desktop platforms have richer native APIs for this, but the
/// probe needs no extra dependencies and answers the only question the
/// sync layer asks here.
pub struct DesktopNetworkMonitor;

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self
    }

    async fn probe(&self) -> NetworkStatus {
        let attempt = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            tokio::net::TcpStream::connect("8.8.8.8:53"),
        )
        .await;

        match attempt {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.probe().await;
        debug!(status = ?status, "Probed network reachability");

        Ok(NetworkInfo {
            status,
            // The probe cannot distinguish WiFi from wired.
            network_type: (status == NetworkStatus::Connected).then_some(NetworkType::Other),
            // Desktop connections are treated as flat-rate.
            is_metered: false,
        })
    }

    async fn is_metered(&self) -> bool {
        false
    }
}
