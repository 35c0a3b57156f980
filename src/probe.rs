use crate::error::{CheckerError, Result};
use crate::traits::Probe;
use crate::types::ProbeResult;
use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode, Url};
use std::error::Error as _;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn default_user_agent() -> String {
    format!("distcheck/{}", env!("CARGO_PKG_VERSION"))
}

/// 403 means "exists but access-restricted", not "missing".
pub fn is_available(status: StatusCode) -> bool {
    status.as_u16() < 400 || status == StatusCode::FORBIDDEN
}

/// HEAD first, ranged GET as fallback.
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Connections must not outlive the probe that opened them.
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self { client, timeout })
    }

    #[cfg(test)]
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::new(timeout, &default_user_agent())
    }

    async fn status_of(&self, url: Url) -> std::result::Result<StatusCode, reqwest::Error> {
        // HEAD is cheap: only metadata, no body
        let resp = self
            .client
            .head(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        if resp.status().as_u16() < 400 {
            return Ok(resp.status());
        }

        // Plenty of file servers reject HEAD; ask for the first byte instead.
        debug!(url = %url, status = resp.status().as_u16(), "HEAD rejected, retrying with ranged GET");
        let resp = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(self.timeout)
            .send()
            .await?;

        Ok(resp.status())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResult> {
        // No scheme, no host, garbage: nothing to send, but still a result.
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(url, error = %e, "unparseable url");
                return Ok(ProbeResult::failed(url, format!("invalid URL: {}", e)));
            }
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            return Ok(ProbeResult::failed(
                url,
                format!("unsupported URL scheme '{}'", parsed.scheme()),
            ));
        }

        let start = Instant::now();

        match self.status_of(parsed).await {
            Ok(status) => Ok(ProbeResult {
                url: url.to_string(),
                available: is_available(status),
                status_code: Some(status.as_u16()),
                error: None,
                latency_ms: Some(start.elapsed().as_millis() as u64),
            }),
            Err(e) if e.is_timeout() => Ok(ProbeResult::failed(url, "timeout")),
            Err(e) if e.is_builder() => Err(CheckerError::InvalidRequest {
                url: url.to_string(),
                message: describe(&e),
            }),
            Err(e) => {
                debug!(url, error = %e, "probe failed");
                Ok(ProbeResult::failed(url, describe(&e)))
            }
        }
    }
}

/// reqwest's top-level message is generic; the cause chain has the detail.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
