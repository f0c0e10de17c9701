use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

/// Transport-layer connect check for a host and port.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// Returns `true` iff a connection to `host:port` completes within `timeout`.
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Plain TCP connect. The stream is dropped as soon as the handshake completes.
#[derive(Debug, Clone, Default)]
pub struct TcpConnectProbe;

#[async_trait]
impl PortProbe for TcpConnectProbe {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        let start = Instant::now();
        match time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                tracing::debug!(
                    "{host}:{port} accepted connection in {}ms",
                    start.elapsed().as_millis()
                );
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("{host}:{port} refused: {e}");
                false
            }
            Err(_) => {
                tracing::debug!("{host}:{port} connect timed out after {timeout:?}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(
            TcpConnectProbe
                .probe("127.0.0.1", port, Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn closed_port_is_closed() {
        // Grab a free port, then release it so nothing is listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(
            !TcpConnectProbe
                .probe("127.0.0.1", port, Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn bad_host_is_closed() {
        assert!(
            !TcpConnectProbe
                .probe("no-such-host.invalid", 554, Duration::from_millis(500))
                .await
        );
    }
}
