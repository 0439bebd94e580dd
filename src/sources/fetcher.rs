use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use tracing::warn;

use crate::config::AppConfig;
use crate::core::error::IngestError;
use crate::core::source::AlertSource;

/// Successful terminal fetch. `response_time_ms` is wall-clock from the
/// first attempt, retries and backoff included.
#[derive(Debug)]
pub struct FetchOutcome {
    pub payload: String,
    pub http_status: u16,
    pub response_time_ms: i64,
    pub attempts: u32,
}

/// Terminal failure after the retry budget is spent. Only this surfaces;
/// intermediate failures are logged and swallowed.
#[derive(Debug)]
pub struct FetchFailure {
    pub error: IngestError,
    pub attempts: u32,
    pub response_time_ms: i64,
}

impl FetchFailure {
    pub fn message(&self) -> String {
        format!("{} (after {} attempts)", self.error, self.attempts)
    }

    pub fn http_status(&self) -> Option<u16> {
        self.error.http_status()
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
    base_delay: Duration,
}

impl Fetcher {
    pub fn new(config: &AppConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(4))
            .build()
            .map_err(|e| IngestError::Config(e.to_string()))?;
        Ok(Self {
            client,
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// Fetch one source's raw payload. Resilient kinds get the full retry
    /// budget with exponential backoff (base × 2^attempt); everything else
    /// gets a single attempt. Non-2xx responses count as failures.
    pub async fn fetch(&self, source: &AlertSource) -> Result<FetchOutcome, FetchFailure> {
        let started = Instant::now();
        let budget = if source.kind.is_resilient() {
            self.max_attempts
        } else {
            1
        };

        let mut attempt = 0u32;
        loop {
            match self.attempt(source).await {
                Ok((payload, http_status)) => {
                    return Ok(FetchOutcome {
                        payload,
                        http_status,
                        response_time_ms: started.elapsed().as_millis() as i64,
                        attempts: attempt + 1,
                    });
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= budget {
                        return Err(FetchFailure {
                            error,
                            attempts: attempt,
                            response_time_ms: started.elapsed().as_millis() as i64,
                        });
                    }
                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        source = %source.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "fetch attempt failed, backing off: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self, source: &AlertSource) -> Result<(String, u16), IngestError> {
        let mut request = self
            .client
            .get(&source.api_endpoint)
            .header(ACCEPT, source.kind.accept_header());
        if let Some(key) = source.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Http {
                status: status.as_u16(),
                text: status
                    .canonical_reason()
                    .unwrap_or("unrecognized status")
                    .to_string(),
            });
        }
        let payload = response.text().await?;
        Ok((payload, status.as_u16()))
    }
}
