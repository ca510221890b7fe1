//! Publisher for batching and sending kill feed events
//!
//! The Publisher buffers feed events per game channel and provides both sync
//! and async interfaces for delivery. Delivery failure never fails ingest;
//! the frag is already durable locally, only the notification is lost.

use std::collections::HashMap;

use crate::config::FeedConfig;
use crate::error::Result;

use super::client::FeedClient;
use super::events::{FeedBatch, KillFeed};

/// Manages kill feed publishing
///
/// Events are buffered per channel and sent when:
/// - Batch size threshold is reached
/// - Flush is explicitly called
pub struct Publisher {
    client: FeedClient,
    /// Buffered events per channel
    buffers: HashMap<String, Vec<KillFeed>>,
    /// Stats for reporting
    stats: PublishStats,
}

/// Publishing statistics
#[derive(Debug, Default, Clone)]
pub struct PublishStats {
    /// Total events sent successfully
    pub events_sent: usize,
    /// Total events rejected by the endpoint
    pub events_rejected: usize,
    /// Number of API calls made
    pub api_calls: usize,
    /// Number of failed API calls
    pub api_failures: usize,
}

impl Publisher {
    /// Create a new publisher from configuration
    ///
    /// Returns None if the feed is not enabled or not properly configured.
    pub fn new(config: &FeedConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }

        let client = FeedClient::new(config.clone())?;
        Ok(Some(Self {
            client,
            buffers: HashMap::new(),
            stats: PublishStats::default(),
        }))
    }

    /// Queue one feed event for a channel
    ///
    /// Events are buffered and sent when batch size is reached.
    /// Returns the number of events sent (may be 0 if still buffering).
    pub async fn queue(&mut self, channel: &str, event: KillFeed) -> Result<usize> {
        let batch_size = self.client.batch_size();

        let buffer = self.buffers.entry(channel.to_string()).or_default();
        buffer.push(event);

        if buffer.len() >= batch_size {
            return self.flush_channel(channel).await;
        }

        Ok(0)
    }

    /// Flush all pending events for a channel
    async fn flush_channel(&mut self, channel: &str) -> Result<usize> {
        let buffer = match self.buffers.get_mut(channel) {
            Some(b) if !b.is_empty() => b,
            _ => return Ok(0),
        };

        let events: Vec<KillFeed> = buffer.drain(..).collect();

        let batch = FeedBatch {
            channel: channel.to_string(),
            events,
        };

        self.stats.api_calls += 1;

        match self.client.send_events_with_retry(&batch).await {
            Ok(response) => {
                self.stats.events_sent += response.accepted;
                self.stats.events_rejected += response.rejected;
                tracing::debug!(
                    channel = %channel,
                    accepted = response.accepted,
                    rejected = response.rejected,
                    "Published kill feed events"
                );
                Ok(response.accepted)
            }
            Err(e) => {
                self.stats.api_failures += 1;
                tracing::warn!(
                    channel = %channel,
                    error = %e,
                    "Failed to publish kill feed events"
                );
                // Don't return error - feed delivery must never block ingest.
                // Events are lost but the frags are in the local DB.
                Ok(0)
            }
        }
    }

    /// Flush all pending events across all channels
    pub async fn flush_all(&mut self) -> Result<usize> {
        let channels: Vec<String> = self.buffers.keys().cloned().collect();
        let mut total_sent = 0;

        for channel in channels {
            total_sent += self.flush_channel(&channel).await?;
        }

        Ok(total_sent)
    }

    /// Get current publishing statistics
    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    /// Get number of pending events across all buffers
    pub fn pending_count(&self) -> usize {
        self.buffers.values().map(|b| b.len()).sum()
    }

    /// Check if there are any pending events
    pub fn has_pending(&self) -> bool {
        self.buffers.values().any(|b| !b.is_empty())
    }
}

/// Synchronous wrapper for Publisher
///
/// Provides blocking methods for use in synchronous code.
pub struct SyncPublisher {
    inner: Publisher,
    runtime: tokio::runtime::Runtime,
}

impl SyncPublisher {
    /// Create a new sync publisher from configuration
    ///
    /// Returns None if the feed is not enabled or not properly configured.
    pub fn new(config: &FeedConfig) -> Result<Option<Self>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| crate::error::Error::Feed(format!("failed to create runtime: {}", e)))?;

        match Publisher::new(config)? {
            Some(publisher) => Ok(Some(Self {
                inner: publisher,
                runtime,
            })),
            None => Ok(None),
        }
    }

    /// Queue one feed event (blocking)
    pub fn queue(&mut self, channel: &str, event: KillFeed) -> Result<usize> {
        self.runtime.block_on(self.inner.queue(channel, event))
    }

    /// Flush all pending events (blocking)
    pub fn flush_all(&mut self) -> Result<usize> {
        self.runtime.block_on(self.inner.flush_all())
    }

    /// Get current publishing statistics
    pub fn stats(&self) -> &PublishStats {
        self.inner.stats()
    }

    /// Get number of pending events
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    /// Check if there are any pending events
    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_disabled_config() {
        let config = FeedConfig::default();
        let publisher = Publisher::new(&config).unwrap();
        assert!(publisher.is_none());
    }

    #[test]
    fn test_sync_publisher_disabled_config() {
        let config = FeedConfig::default();
        let publisher = SyncPublisher::new(&config).unwrap();
        assert!(publisher.is_none());
    }

    #[test]
    fn test_publish_stats_default() {
        let stats = PublishStats::default();
        assert_eq!(stats.events_sent, 0);
        assert_eq!(stats.api_calls, 0);
    }
}
