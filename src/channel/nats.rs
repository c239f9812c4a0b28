//! Core NATS telemetry channel
//!
//! Plain NATS publish/subscribe (no JetStream): fire-and-forget delivery,
//! matching the at-most-once semantics the codec assumes.

use super::{PayloadStream, TelemetryChannel};
use crate::config::NatsChannelConfig;
use crate::error::{FsaeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;

/// NATS channel bound to a single subject
pub struct NatsChannel {
    client: async_nats::Client,
    config: NatsChannelConfig,
}

impl NatsChannel {
    /// Connect to the NATS server named in the config
    pub async fn connect(config: NatsChannelConfig) -> Result<Self> {
        let client = build_connect_options(&config)
            .connect(&config.url)
            .await
            .map_err(|e| FsaeError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, subject = %config.subject, "Connected to NATS");

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TelemetryChannel for NatsChannel {
    async fn publish(&self, payload: Bytes) -> Result<()> {
        let len = payload.len();
        self.client
            .publish(self.config.subject.clone(), payload)
            .await
            .map_err(|e| FsaeError::Publish {
                subject: self.config.subject.clone(),
                reason: e.to_string(),
            })?;

        tracing::trace!(subject = %self.config.subject, bytes = len, "Record published");
        Ok(())
    }

    async fn subscribe(&self) -> Result<Box<dyn PayloadStream>> {
        let subscriber = self
            .client
            .subscribe(self.config.subject.clone())
            .await
            .map_err(|e| FsaeError::Subscribe {
                subject: self.config.subject.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(subject = %self.config.subject, "Subscribed");
        Ok(Box::new(NatsPayloadStream { subscriber }))
    }

    async fn flush(&self) -> Result<()> {
        self.client.flush().await.map_err(|e| FsaeError::Publish {
            subject: self.config.subject.clone(),
            reason: format!("flush failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "nats"
    }
}

struct NatsPayloadStream {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl PayloadStream for NatsPayloadStream {
    async fn next(&mut self) -> Result<Option<Bytes>> {
        Ok(self.subscriber.next().await.map(|message| message.payload))
    }
}

fn build_connect_options(config: &NatsChannelConfig) -> async_nats::ConnectOptions {
    let name = config
        .client_name
        .clone()
        .unwrap_or_else(|| format!("fsae-{}", uuid::Uuid::new_v4()));

    let mut opts = async_nats::ConnectOptions::new()
        .name(name)
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}
