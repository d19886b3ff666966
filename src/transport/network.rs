//! Network link the broker session rides on
//!
//! On the reference board this is Wi-Fi association plus DHCP. On a host the
//! link is considered up once the broker address resolves, which is the part
//! of "IP acquisition" a host process can observe.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Network link errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Association with '{ssid}' failed: {reason}")]
    AssociationFailed { ssid: String, reason: String },
    #[error("Address resolution failed for {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Link-level connectivity, polled on demand
#[async_trait]
pub trait NetworkLink: Send {
    /// Start joining the network; completion is observed through `is_up`
    async fn associate(&mut self) -> Result<(), NetworkError>;

    /// Whether the link currently reports connected
    async fn is_up(&mut self) -> bool;
}

#[async_trait]
impl<L: NetworkLink + ?Sized> NetworkLink for Box<L> {
    async fn associate(&mut self) -> Result<(), NetworkError> {
        (**self).associate().await
    }

    async fn is_up(&mut self) -> bool {
        (**self).is_up().await
    }
}

/// Host network link: association is delegated to the operating system
pub struct HostNetworkLink {
    ssid: String,
    secured: bool,
    probe_host: String,
    probe_port: u16,
}

impl HostNetworkLink {
    pub fn new(ssid: &str, password: Option<&str>, probe_host: &str, probe_port: u16) -> Self {
        Self {
            ssid: ssid.to_string(),
            secured: password.is_some_and(|p| !p.is_empty()),
            probe_host: probe_host.to_string(),
            probe_port,
        }
    }

    async fn resolve(&self) -> Result<usize, NetworkError> {
        let addrs = tokio::net::lookup_host((self.probe_host.as_str(), self.probe_port))
            .await
            .map_err(|source| NetworkError::Resolution {
                host: self.probe_host.clone(),
                source,
            })?;
        Ok(addrs.count())
    }
}

#[async_trait]
impl NetworkLink for HostNetworkLink {
    async fn associate(&mut self) -> Result<(), NetworkError> {
        info!(
            ssid = %self.ssid,
            secured = self.secured,
            "Joining network (managed by host OS)"
        );
        Ok(())
    }

    async fn is_up(&mut self) -> bool {
        match self.resolve().await {
            Ok(count) if count > 0 => true,
            Ok(_) => {
                debug!(host = %self.probe_host, "Resolution returned no addresses");
                false
            }
            Err(e) => {
                debug!("Network link down: {}", e);
                false
            }
        }
    }
}
