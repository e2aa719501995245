//! Timeout enforcement for probes.
//!
//! A probe that misses its deadline is reported as
//! [`ContinuityError::ProbeTimeout`], which every caller treats exactly like
//! a failed probe.

use std::time::Duration;

use tokio::time;

use crate::error::{ContinuityError, ContinuityResult};
use crate::probe::Probe;

/// Run one probe under a deadline.
pub async fn probe_with_timeout(
    probe: &dyn Probe,
    target: &str,
    timeout: Duration,
) -> ContinuityResult<Duration> {
    match time::timeout(timeout, probe.probe(target)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(target = %target, timeout_ms = timeout.as_millis() as u64, "Probe timed out");
            Err(ContinuityError::ProbeTimeout {
                target: target.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
