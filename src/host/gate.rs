//! Rendering capability handshake

use std::time::Duration;

use crate::core::config::ViewerConfig;
use crate::core::error::Error;
use crate::core::types::Result;

/// Waits for the rendering capability to become observable.
///
/// The probe is polled on a fixed interval because the capability may be
/// provided asynchronously by something unrelated to the caller. Waiting is
/// bounded by `timeout`.
#[derive(Clone, Copy, Debug)]
pub struct CapabilityGate {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl CapabilityGate {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self { poll_interval, timeout }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.capability_poll_ms),
            Duration::from_millis(config.capability_timeout_ms),
        )
    }

    /// Resolve once `probe` returns true, or fail with `CapabilityTimeout`
    pub async fn wait(&self, mut probe: impl FnMut() -> bool) -> Result<()> {
        if probe() {
            return Ok(());
        }
        log::debug!("Waiting for rendering capability (timeout {:?})", self.timeout);
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                log::error!("Rendering capability not available after {:?}", self.timeout);
                return Err(Error::CapabilityTimeout(self.timeout));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            if probe() {
                return Ok(());
            }
        }
    }
}

impl Default for CapabilityGate {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}
