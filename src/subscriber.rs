//! Consuming side: engineer (decrypting) and viewer (allow-listed) subscribers

use crate::channel::PayloadStream;
use crate::envelope::{EncryptionHeader, EnvelopeCodec, Opened};
use crate::error::Result;
use crate::stats::{CryptoMode, LatencyWindow, PerfLog, WindowStats, DEFAULT_WINDOW_SECS};
use crate::types::Record;
use crate::wire;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Field carrying the producer's send time in seconds since the epoch
pub const TIMESTAMP_FIELD: &str = "timestamp";

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Full-access subscriber: opens records and tracks end-to-end latency
pub struct EngineerSubscriber {
    codec: Arc<EnvelopeCodec>,
    window: LatencyWindow,
    perf_log: Option<PerfLog>,
    last_mode: CryptoMode,
}

impl EngineerSubscriber {
    pub fn new(codec: Arc<EnvelopeCodec>) -> Self {
        Self {
            codec,
            window: LatencyWindow::new(DEFAULT_WINDOW_SECS, now_secs()),
            perf_log: None,
            last_mode: CryptoMode::Off,
        }
    }

    /// Append closed windows to a CSV perf log
    pub fn with_perf_log(mut self, perf_log: PerfLog) -> Self {
        self.perf_log = Some(perf_log);
        self
    }

    /// Replace the statistics window (length in seconds, start time)
    pub fn with_window(mut self, window: LatencyWindow) -> Self {
        self.window = window;
        self
    }

    /// Mode of the most recent record
    pub fn last_mode(&self) -> CryptoMode {
        self.last_mode
    }

    /// Decode, open, and account for one payload received at `now`
    pub fn handle_at(&mut self, payload: &[u8], now: f64) -> Result<Opened> {
        let record = wire::decode_record(payload)?;

        self.last_mode = match EncryptionHeader::from_record(&record) {
            Ok(Some(header)) if header.is_encrypted() => CryptoMode::On,
            _ => CryptoMode::Off,
        };

        let opened = self.codec.open(record);

        let latency = opened
            .record
            .get(TIMESTAMP_FIELD)
            .and_then(|v| v.as_f64())
            .map(|sent| now - sent);
        self.window.record(latency);

        tracing::debug!(
            decrypted = ?opened.report.decrypted,
            failed = opened.report.failures.len(),
            latency_ms = ?latency.map(|l| l * 1000.0),
            "Engineer received record"
        );

        Ok(opened)
    }

    pub fn handle(&mut self, payload: &[u8]) -> Result<Opened> {
        self.handle_at(payload, now_secs())
    }

    /// Close the stats window if due, logging and persisting the result
    pub fn tick_at(&mut self, now: f64) -> Result<Option<WindowStats>> {
        let Some(stats) = self.window.snapshot(now, self.last_mode) else {
            return Ok(None);
        };

        tracing::info!(
            mode = %stats.mode,
            msgs_per_sec = stats.msgs_per_sec,
            p50_ms = stats.p50 * 1000.0,
            p95_ms = stats.p95 * 1000.0,
            "Latency window closed"
        );

        if let Some(log) = &self.perf_log {
            log.append(chrono::Local::now(), &stats)?;
        }
        Ok(Some(stats))
    }

    /// Consume a stream until it ends, closing stats windows once a second
    ///
    /// Payloads that fail to decode are logged and skipped.
    pub async fn run(&mut self, mut stream: Box<dyn PayloadStream>) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                next = stream.next() => match next? {
                    Some(payload) => {
                        if let Err(e) = self.handle(&payload) {
                            tracing::warn!(error = %e, "Dropping undecodable payload");
                        }
                    }
                    None => return Ok(()),
                },
                _ = ticker.tick() => {
                    self.tick_at(now_secs())?;
                }
            }
        }
    }
}

/// Field allow-list applied by restricted consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAllowList {
    fields: BTreeSet<String>,
}

impl FieldAllowList {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Project a record onto the allow-list; absent fields become `null`
    pub fn apply(&self, record: &Record) -> Record {
        self.fields
            .iter()
            .map(|field| {
                let value = record.get(field).cloned().unwrap_or(serde_json::Value::Null);
                (field.clone(), value)
            })
            .collect()
    }
}

impl Default for FieldAllowList {
    fn default() -> Self {
        Self::new(["timestamp", "temperature", "pressure", "speed"])
    }
}

/// Restricted subscriber: never decrypts, only sees allow-listed fields
#[derive(Debug, Clone, Default)]
pub struct ViewerSubscriber {
    allow_list: FieldAllowList,
}

impl ViewerSubscriber {
    pub fn new(allow_list: FieldAllowList) -> Self {
        Self { allow_list }
    }

    pub fn handle(&self, payload: &[u8]) -> Result<Record> {
        let record = wire::decode_record(payload)?;
        let view = self.allow_list.apply(&record);
        tracing::debug!(fields = view.len(), "Viewer received record");
        Ok(view)
    }
}
