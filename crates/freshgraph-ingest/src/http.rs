//! HTTP transport with bounded retries.
//!
//! Retries connection failures, timeouts and the statuses in
//! [`RetryPolicy::status_forcelist`] on an exponential schedule: retry `n`
//! (1-based) waits `backoff_factor * 2^(n-1)`.

use crate::error::{IngestError, Result};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_millis(300),
            status_forcelist: vec![500, 502, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay schedule, unjittered and unbounded in time; the retry count is
    /// enforced by the caller.
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.backoff_factor)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(60))
            .with_max_elapsed_time(None)
            .build()
    }

    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.status_forcelist.contains(&status.as_u16())
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            user_agent: concat!("freshgraph/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared HTTP session, built once per run.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("freshgraph")),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(IngestError::Client)?;
        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    /// GET `url` and return the body of the first successful response.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        let attempts = AtomicU32::new(0);

        backoff::future::retry_notify(
            self.retry.schedule(),
            || async {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                let err = match self.client.get(url.clone()).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        return resp.text().await.map_err(|source| {
                            backoff::Error::permanent(IngestError::Http {
                                url: url.to_string(),
                                source,
                            })
                        });
                    }
                    Ok(resp) => {
                        let status = resp.status();
                        let err = IngestError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        };
                        if !self.retry.retries_status(status) {
                            return Err(backoff::Error::permanent(err));
                        }
                        err
                    }
                    Err(source) => {
                        let transient = source.is_connect() || source.is_timeout();
                        let err = IngestError::Http {
                            url: url.to_string(),
                            source,
                        };
                        if !transient {
                            return Err(backoff::Error::permanent(err));
                        }
                        err
                    }
                };

                if attempt >= self.retry.max_retries {
                    tracing::error!(url = %url, retries = attempt, error = %err, "giving up");
                    return Err(backoff::Error::permanent(err));
                }
                Err(backoff::Error::transient(err))
            },
            |err: IngestError, delay: Duration| {
                tracing::warn!(
                    url = %url,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient http failure; retrying"
                );
            },
        )
        .await
    }
}
