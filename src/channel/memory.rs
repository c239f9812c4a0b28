//! In-process broadcast channel
//!
//! Every subscriber sees every record published after it subscribed.
//! Slow subscribers lose records instead of blocking the publisher.

use super::{PayloadStream, TelemetryChannel};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Broadcast channel for tests and single-process deployments
pub struct MemoryChannel {
    sender: broadcast::Sender<Bytes>,
}

impl MemoryChannel {
    /// Create a channel buffering up to `capacity` records per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl TelemetryChannel for MemoryChannel {
    async fn publish(&self, payload: Bytes) -> Result<()> {
        // No subscribers: the record is dropped, as on any at-most-once bus
        if let Err(e) = self.sender.send(payload) {
            tracing::debug!(bytes = e.0.len(), "No subscribers, record dropped");
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn PayloadStream>> {
        Ok(Box::new(MemoryPayloadStream {
            inner: BroadcastStream::new(self.sender.subscribe()),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemoryPayloadStream {
    inner: BroadcastStream<Bytes>,
}

#[async_trait]
impl PayloadStream for MemoryPayloadStream {
    async fn next(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.inner.next().await {
                Some(Ok(payload)) => return Ok(Some(payload)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Subscriber lagged, records dropped");
                }
                None => return Ok(None),
            }
        }
    }
}
