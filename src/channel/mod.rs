//! Telemetry channel trait: the transport between publisher and subscribers
//!
//! Channels move opaque serialized records with at-most-once semantics:
//! a record may be dropped, never redelivered. Decoding and rejecting
//! malformed payloads is the subscriber's job (see [`crate::wire`]).

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod nats;

pub use memory::MemoryChannel;
pub use nats::NatsChannel;

/// Core trait for telemetry transports
#[async_trait]
pub trait TelemetryChannel: Send + Sync {
    /// Publish one serialized record
    async fn publish(&self, payload: Bytes) -> Result<()>;

    /// Start receiving records published from now on
    async fn subscribe(&self) -> Result<Box<dyn PayloadStream>>;

    /// Flush buffered publishes
    ///
    /// Default implementation is a no-op for unbuffered channels.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Channel name (e.g., "memory", "nats")
    fn name(&self) -> &str;
}

/// Async stream of raw payloads from any channel
#[async_trait]
pub trait PayloadStream: Send {
    /// Receive the next payload, or `None` once the channel is closed
    async fn next(&mut self) -> Result<Option<Bytes>>;
}
