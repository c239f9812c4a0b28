//! Subscriber-side latency statistics and the CSV perf log
//!
//! A [`LatencyWindow`] accumulates end-to-end latencies for a fixed wall-clock
//! window, then yields throughput and p50/p95 and starts over.

use crate::error::{FsaeError, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default statistics window in seconds
pub const DEFAULT_WINDOW_SECS: f64 = 10.0;

/// Fewer samples than this and p95 falls back to p50
const P95_MIN_SAMPLES: usize = 20;

const PERF_LOG_HEADER: &str = "time,mode,msgs_per_sec,p50_ms,p95_ms";

/// Whether the last record seen in the window was really encrypted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CryptoMode {
    On,
    #[default]
    Off,
}

impl fmt::Display for CryptoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "crypto_on"),
            Self::Off => write!(f, "crypto_off"),
        }
    }
}

/// Summary of one completed window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub mode: CryptoMode,

    /// Records received per second over the window
    pub msgs_per_sec: f64,

    /// Median latency in seconds
    pub p50: f64,

    /// 95th percentile latency in seconds
    pub p95: f64,

    /// Records counted in the window
    pub messages: u64,

    /// Latency samples in the window
    pub samples: usize,
}

/// Rolling wall-clock window of latency samples
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    window_secs: f64,
    window_start: f64,
    messages: u64,
    latencies: Vec<f64>,
}

impl LatencyWindow {
    /// Start a window at `now` (seconds since the Unix epoch)
    pub fn new(window_secs: f64, now: f64) -> Self {
        Self {
            window_secs,
            window_start: now,
            messages: 0,
            latencies: Vec::new(),
        }
    }

    /// Count one received record, with its latency when known
    pub fn record(&mut self, latency: Option<f64>) {
        self.messages += 1;
        if let Some(latency) = latency {
            self.latencies.push(latency);
        }
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Close the window if it has run its length and saw any records
    pub fn snapshot(&mut self, now: f64, mode: CryptoMode) -> Option<WindowStats> {
        let elapsed = now - self.window_start;
        if elapsed < self.window_secs || self.messages == 0 {
            return None;
        }

        let mut sorted = std::mem::take(&mut self.latencies);
        sorted.sort_by(|a, b| a.total_cmp(b));

        let p50 = median(&sorted);
        let p95 = if sorted.len() >= P95_MIN_SAMPLES {
            exclusive_quantile(&sorted, 20, 19)
        } else {
            p50
        };

        let stats = WindowStats {
            mode,
            msgs_per_sec: self.messages as f64 / elapsed,
            p50,
            p95,
            messages: self.messages,
            samples: sorted.len(),
        };

        self.messages = 0;
        self.window_start = now;
        Some(stats)
    }
}

/// Median of sorted data, `0.0` when empty
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// `i`-th of `q - 1` cut points using the exclusive method
///
/// Requires at least two samples.
fn exclusive_quantile(sorted: &[f64], q: usize, i: usize) -> f64 {
    let n = sorted.len();
    let m = n + 1;
    let j = (i * m / q).clamp(1, n - 1);
    let delta = (i * m) as f64 - (j * q) as f64;
    (sorted[j - 1] * (q as f64 - delta) + sorted[j] * delta) / q as f64
}

/// Append-only CSV log of window statistics
#[derive(Debug, Clone)]
pub struct PerfLog {
    path: PathBuf,
}

impl PerfLog {
    /// Open the log, writing the CSV header if the file is new
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FsaeError::Config(format!(
                    "Failed to create perf log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => writeln!(file, "{}", PERF_LOG_HEADER)?,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row for a completed window
    pub fn append(&self, at: DateTime<Local>, stats: &WindowStats) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(
            file,
            "{},{},{:.2},{:.3},{:.3}",
            at.format("%Y-%m-%d %H:%M:%S"),
            stats.mode,
            stats.msgs_per_sec,
            stats.p50 * 1000.0,
            stats.p95 * 1000.0,
        )?;
        Ok(())
    }
}
