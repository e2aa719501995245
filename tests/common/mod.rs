//! Shared fakes for integration testing.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use continuity_plane::error::{ContinuityError, ContinuityResult};
use continuity_plane::probe::Probe;

/// Probe whose answers are scripted per target.
///
/// Every target answers in `latency` unless it has been marked down.
pub struct ScriptedProbe {
    down: Mutex<HashSet<String>>,
    latency: Mutex<Duration>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            down: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::from_millis(2)),
        }
    }

    pub fn set_down(&self, target: &str) {
        self.down.lock().insert(target.to_string());
    }

    pub fn set_up(&self, target: &str) {
        self.down.lock().remove(target);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, target: &str) -> ContinuityResult<Duration> {
        if self.down.lock().contains(target) {
            return Err(ContinuityError::probe_failure(target, "connection refused"));
        }
        Ok(*self.latency.lock())
    }
}

/// Bind a listener on an ephemeral port that accepts and drops connections.
pub async fn start_tcp_listener() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    (addr, handle)
}
