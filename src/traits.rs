use crate::error::Result;
use crate::types::ProbeResult;
use async_trait::async_trait;

/// Probe: checks whether one concrete URL is reachable.
#[async_trait]
pub trait Probe: Sync + Send {
    /// Check a single URL.
    ///
    /// Network failures (timeout, DNS, refused, TLS...) and URLs that do not
    /// parse are reported inside the returned `ProbeResult`. Only a request
    /// the HTTP client refuses to build comes back as `Err`.
    async fn probe(&self, url: &str) -> Result<ProbeResult>;
}
