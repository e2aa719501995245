//! TCP connect probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::{ContinuityError, ContinuityResult};
use crate::probe::Probe;

/// Succeeds when a TCP connection to `host:port` can be established.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, target: &str) -> ContinuityResult<Duration> {
        let start = Instant::now();
        match TcpStream::connect(target).await {
            Ok(stream) => {
                let latency = start.elapsed();
                drop(stream);
                Ok(latency)
            }
            Err(e) => {
                tracing::debug!(target = %target, error = %e, "TCP probe failed");
                Err(ContinuityError::probe_failure(target, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_probe_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let latency = TcpProbe::new().probe(&addr.to_string()).await;
        assert!(latency.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_probe_closed_port() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = TcpProbe::new().probe(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, ContinuityError::ProbeFailure { .. }));
    }
}
