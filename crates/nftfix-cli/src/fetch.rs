//! Metadata fetching with bounded exponential backoff
//!
//! Metadata documents live on public gateways that time out, rate limit and
//! occasionally serve garbage. Every failure (transport, non-2xx status or an
//! unparseable body) is retried with a capped exponential delay plus random
//! jitter. When the attempt budget runs out the caller gets
//! [`CliError::FetchExhausted`] and must treat the record as unresolved.

use crate::error::{CliError, Result};
use nftfix_common::MetadataDocument;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Fetch Constants
// ============================================================================

/// Default number of attempts per document
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Default per-attempt timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Cap on the exponential part of the backoff in seconds
pub const DEFAULT_MAX_DELAY_SECS: u64 = 32;

/// Browser user agent; several gateways reject unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36";

/// Fetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            max_jitter: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            max_delay: self.max_delay,
            max_jitter: self.max_jitter,
        }
    }
}

/// Delay schedule between attempts
///
/// Before retry `r` (the number of attempts already made) the delay is
/// `min(max_delay, 2^r ms) + jitter`, with jitter drawn from `[0, max_jitter]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Backoff {
    /// Exponential part of the delay before retry `retry`
    pub fn base_delay(&self, retry: u32) -> Duration {
        let secs = 2f64.powi(retry.min(1023) as i32) / 1000.0;
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Full delay for a given jitter draw; the draw is clamped to `max_jitter`
    pub fn delay(&self, retry: u32, jitter: Duration) -> Duration {
        self.base_delay(retry) + jitter.min(self.max_jitter)
    }

    /// Draw a delay using `rng` for the jitter
    pub fn sample<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(rng.gen_range(0.0..=self.max_jitter.as_secs_f64()))
        };
        self.delay(retry, jitter)
    }

    /// Largest possible total sleep across `attempts` attempts
    pub fn upper_bound(&self, attempts: u32) -> Duration {
        (self.max_delay + self.max_jitter) * attempts.saturating_sub(1)
    }
}

/// HTTP fetcher for metadata documents
pub struct ResilientFetcher {
    client: Client,
    config: FetchConfig,
}

impl ResilientFetcher {
    /// Create a new fetcher
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch and parse the document at `uri`, retrying per the backoff schedule
    pub async fn fetch(&self, uri: &str) -> Result<MetadataDocument> {
        let attempts = self.config.max_attempts.max(1);
        let backoff = self.config.backoff();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff.sample(attempt - 1, &mut rand::thread_rng());
                debug!(uri, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(uri).await {
                Ok(document) => return Ok(document),
                Err(e) => {
                    warn!(uri, attempt, max_attempts = attempts, error = %e, "Metadata request failed");
                    last_error = e.to_string();
                },
            }
        }

        Err(CliError::FetchExhausted {
            uri: uri.to_string(),
            attempts,
            last_error,
        })
    }

    async fn fetch_once(&self, uri: &str) -> Result<MetadataDocument> {
        let response = self.client.get(uri).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
