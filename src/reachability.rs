use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time;

/// Network-layer liveness check for a host.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns `true` only if the host answered within `timeout`.
    async fn probe(&self, host: &str, timeout: Duration) -> bool;
}

/// Sends a single ICMP echo request and waits for the reply.
///
/// Name resolution counts against the same deadline. Raw or datagram ICMP
/// sockets need privileges on most systems; when the socket cannot be opened
/// the host is reported unreachable, so unprivileged users should pick
/// [`SkipReachability`] instead.
#[derive(Debug, Clone, Default)]
pub struct IcmpProbe;

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self, host: &str, timeout: Duration) -> bool {
        match time::timeout(timeout, echo(host)).await {
            Ok(Ok(rtt)) => {
                tracing::debug!("{host} answered echo in {rtt:?}");
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("echo to {host} failed: {e}");
                false
            }
            Err(_) => {
                tracing::debug!("echo to {host} timed out after {timeout:?}");
                false
            }
        }
    }
}

async fn echo(host: &str) -> anyhow::Result<Duration> {
    let ip = resolve(host).await?;
    let payload = [0u8; 56];
    let (_packet, rtt) = surge_ping::ping(ip, &payload).await?;
    Ok(rtt)
}

async fn resolve(host: &str) -> anyhow::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((host, 0))
        .await?
        .map(|sa| sa.ip())
        .next()
        .ok_or_else(|| anyhow::anyhow!("no addresses for {host}"))
}

/// Treats every host as reachable, leaving the port probe as the first real check.
#[derive(Debug, Clone, Default)]
pub struct SkipReachability;

#[async_trait]
impl ReachabilityProbe for SkipReachability {
    async fn probe(&self, _host: &str, _timeout: Duration) -> bool {
        true
    }
}
