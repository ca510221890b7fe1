//! HTTP client for kill feed delivery
//!
//! Pushes feed batches to the configured broadcast endpoint. The endpoint
//! owns fan-out to subscribers; this client only speaks the ingest side of
//! that contract.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;
use crate::error::{Error, Result};

use super::events::{FeedBatch, KillFeed};

/// Response from POST /feeds/events
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    /// Number of events accepted
    pub accepted: usize,
    /// Number of events rejected (duplicates, validation errors)
    #[serde(default)]
    pub rejected: usize,
}

/// HTTP client for the feed endpoint
pub struct FeedClient {
    config: FeedConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl FeedClient {
    /// Create a new feed client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("feed.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// Send a batch of feed events for a channel
    ///
    /// Returns the number of events accepted and rejected.
    pub async fn send_events(&self, batch: &FeedBatch) -> Result<FeedResponse> {
        let url = format!("{}/feeds/events", self.base_url);

        let request_body = SendFeedRequest {
            channel: &batch.channel,
            events: &batch.events,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: FeedResponse = response
                .json()
                .await
                .map_err(|e| Error::Feed(format!("failed to parse response: {}", e)))?;
            Ok(result)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Feed(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }

    /// Send events with retry logic
    ///
    /// Retries transient failures (5xx, timeouts) with exponential backoff.
    pub async fn send_events_with_retry(&self, batch: &FeedBatch) -> Result<FeedResponse> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying send_events (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.send_events(batch).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient error sending feed events: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Feed("max retries exceeded".to_string())))
    }

    /// Check if the feed endpoint is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Get the configured batch size
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }
}

/// Request body for POST /feeds/events
#[derive(Serialize)]
struct SendFeedRequest<'a> {
    channel: &'a str,
    events: &'a [KillFeed],
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Feed(msg) => {
            // Retry on 5xx errors
            msg.contains("50") && (msg.contains("API error") || msg.contains("HTTP"))
                // Retry on network/timeout errors
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}
