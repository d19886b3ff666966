//! Connection management
//!
//! [`ConnectionManager`] owns the network link and the broker transport and
//! exposes idempotent "ensure connected" operations. Both block, retrying per
//! their [`RetryPolicy`], until the dependency reports up. With the default
//! policy they never give up.

pub mod retry;

pub use retry::{RetryDecision, RetryPolicy};

use crate::error::{TelemetryError, TelemetryResult};
use crate::transport::{NetworkLink, Transport};
use tracing::{info, warn};

/// Owner of the network link and broker session
pub struct ConnectionManager<N, T> {
    link: N,
    transport: T,
    network_retry: RetryPolicy,
    broker_retry: RetryPolicy,
}

impl<N, T> ConnectionManager<N, T>
where
    N: NetworkLink,
    T: Transport,
{
    pub fn new(link: N, transport: T, network_retry: RetryPolicy, broker_retry: RetryPolicy) -> Self {
        Self {
            link,
            transport,
            network_retry,
            broker_retry,
        }
    }

    /// Block until the network link reports up.
    ///
    /// Never returns `Ok` while the link is down.
    pub async fn ensure_network_connected(&mut self) -> TelemetryResult<()> {
        if self.link.is_up().await {
            return Ok(());
        }

        info!("Connecting to network...");
        let mut associated = false;
        let mut failed_attempts = 0u32;

        loop {
            if !associated {
                match self.link.associate().await {
                    Ok(()) => associated = true,
                    Err(e) => warn!("Network association failed: {}", e),
                }
            }

            if self.link.is_up().await {
                info!(attempts = failed_attempts + 1, "Network connected");
                return Ok(());
            }

            failed_attempts += 1;
            match self.network_retry.decide(failed_attempts) {
                RetryDecision::Proceed { attempt, delay } => {
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Network not up yet, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { attempts } => {
                    return Err(TelemetryError::RetriesExhausted {
                        target: "network",
                        attempts,
                    });
                }
            }
        }
    }

    /// Block until a broker session is established.
    ///
    /// The network link is ensured first; each failed handshake is logged and
    /// retried after the policy delay.
    pub async fn ensure_broker_connected(&mut self) -> TelemetryResult<()> {
        if self.transport.is_connected() {
            return Ok(());
        }

        self.ensure_network_connected().await?;

        info!("Connecting to MQTT broker...");
        let mut failed_attempts = 0u32;

        loop {
            match self.transport.connect().await {
                Ok(()) => {
                    info!(attempts = failed_attempts + 1, "Connected to MQTT broker");
                    return Ok(());
                }
                Err(e) => {
                    failed_attempts += 1;
                    warn!(attempt = failed_attempts, "MQTT connection attempt failed: {}", e);
                }
            }

            match self.broker_retry.decide(failed_attempts) {
                RetryDecision::Proceed { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    // The link may have dropped while we were failing against the broker
                    self.ensure_network_connected().await?;
                }
                RetryDecision::GiveUp { attempts } => {
                    return Err(TelemetryError::RetriesExhausted {
                        target: "broker",
                        attempts,
                    });
                }
            }
        }
    }

    pub fn is_broker_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn link(&self) -> &N {
        &self.link
    }

    /// Close the broker session, if any
    pub async fn shutdown(&mut self) -> TelemetryResult<()> {
        if self.transport.is_connected() {
            self.transport
                .disconnect()
                .await
                .map_err(TelemetryError::transport)?;
        }
        Ok(())
    }
}
