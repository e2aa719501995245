//! HTTP health-endpoint probe.
//!
//! # Responsibilities
//! - GET `<target><path>` for each check
//! - Treat any 2xx as healthy, everything else as a failure

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use hyper::header::USER_AGENT;
use hyper::{Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::{ContinuityError, ContinuityResult};
use crate::probe::Probe;

/// Probes an HTTP health endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            path: path.into(),
        }
    }

    /// Resolve the URL checked for a target.
    ///
    /// Targets may be bare `host:port` pairs or full `http://` URLs.
    pub fn check_url(&self, target: &str) -> ContinuityResult<url::Url> {
        let base = if target.contains("://") {
            target.to_string()
        } else {
            format!("http://{}", target)
        };
        let base = url::Url::parse(&base)
            .map_err(|e| ContinuityError::probe_failure(target, format!("invalid target: {}", e)))?;
        base.join(&self.path)
            .map_err(|e| ContinuityError::probe_failure(target, format!("invalid path: {}", e)))
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new("/health")
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &str) -> ContinuityResult<Duration> {
        let url = self.check_url(target)?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(USER_AGENT, "continuity-plane-probe")
            .body(Body::empty())
            .map_err(|e| ContinuityError::probe_failure(target, e))?;

        let start = Instant::now();
        match self.client.request(request).await {
            Ok(response) if response.status().is_success() => Ok(start.elapsed()),
            Ok(response) => {
                tracing::warn!(target = %target, status = %response.status(), "Health check failed: non-success status");
                Err(ContinuityError::probe_failure(
                    target,
                    format!("status {}", response.status()),
                ))
            }
            Err(e) => {
                tracing::warn!(target = %target, error = %e, "Health check failed: connection error");
                Err(ContinuityError::probe_failure(target, e))
            }
        }
    }
}
