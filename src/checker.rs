use crate::classify::is_mirror_reference;
use crate::error::Result;
use crate::probe::HttpProbe;
use crate::resolver::resolve_mirror;
use crate::traits::Probe;
use crate::types::{CheckResult, MirrorRegistry};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Checks distfile URLs against a shared, read-only mirror registry.
pub struct Checker {
    probe: Box<dyn Probe>,
    registry: Arc<MirrorRegistry>,
    concurrency: usize,
}

impl Checker {
    pub fn new(probe: Box<dyn Probe>, registry: Arc<MirrorRegistry>) -> Self {
        Self {
            probe,
            registry,
            concurrency: 1,
        }
    }

    /// Checker backed by a real HTTP probe.
    pub fn http(registry: Arc<MirrorRegistry>, timeout: Duration, user_agent: &str) -> Result<Self> {
        Ok(Self::new(Box::new(HttpProbe::new(timeout, user_agent)?), registry))
    }

    /// How many URLs `check_all` may have in flight at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Check one URL: probe it directly, or expand it first if it is a
    /// `mirror://` reference.
    pub async fn check(&self, url: &str) -> Result<CheckResult> {
        if is_mirror_reference(url) {
            resolve_mirror(self.probe.as_ref(), url, &self.registry).await
        } else {
            Ok(CheckResult::Direct(self.probe.probe(url).await?))
        }
    }

    /// Check many URLs; results line up with the input order.
    pub async fn check_all(&self, urls: &[String]) -> Vec<Result<CheckResult>> {
        stream::iter(urls.iter().map(|url| self.check(url)))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
