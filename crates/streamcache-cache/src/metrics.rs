//! Cache I/O statistics.
//!
//! Counts source traffic from the filler and stalls seen by the reader.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by the filler and the reader.
pub struct CacheMetrics {
    /// Bytes read from the source
    source_bytes: AtomicU64,
    /// Source read calls that returned data
    source_reads: AtomicU64,
    /// Source seeks issued after leaving the cached window
    source_seeks: AtomicU64,
    /// Times the cached content was dropped
    flushes: AtomicU64,
    /// Control commands executed by the filler
    controls: AtomicU64,
    /// Reader waits that hit the empty-buffer warning threshold
    stall_events: AtomicU64,
    /// Only the filler records; the reader reads through `try_lock`.
    throughput: Mutex<ThroughputTracker>,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self {
            source_bytes: AtomicU64::new(0),
            source_reads: AtomicU64::new(0),
            source_seeks: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            controls: AtomicU64::new(0),
            stall_events: AtomicU64::new(0),
            throughput: Mutex::new(ThroughputTracker::new()),
        }
    }
}

/// Sliding one-second window of source reads.
struct ThroughputTracker {
    recent_reads: Vec<(u64, Instant)>,
    window: Duration,
    cached_rate: f64,
}

impl ThroughputTracker {
    fn new() -> Self {
        Self {
            recent_reads: Vec::with_capacity(64),
            window: Duration::from_secs(1),
            cached_rate: 0.0,
        }
    }

    fn record(&mut self, bytes: u64) {
        let now = Instant::now();
        self.recent_reads.push((bytes, now));
        if let Some(cutoff) = now.checked_sub(self.window) {
            self.recent_reads.retain(|(_, ts)| *ts > cutoff);
        }

        let total: u64 = self.recent_reads.iter().map(|(b, _)| *b).sum();
        let span = match (self.recent_reads.first(), self.recent_reads.last()) {
            (Some(first), Some(last)) => last.1.duration_since(first.1).as_secs_f64(),
            _ => 0.0,
        };
        self.cached_rate = if span > 0.01 {
            total as f64 / span
        } else {
            total as f64 / self.window.as_secs_f64()
        };
    }
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a source read that returned `bytes`.
    #[inline]
    pub fn record_source_read(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.source_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.source_reads.fetch_add(1, Ordering::Relaxed);
        if let Some(mut tracker) = self.throughput.try_lock() {
            tracker.record(bytes);
        }
    }

    #[inline]
    pub fn record_source_seek(&self) {
        self.source_seeks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_control(&self) {
        self.controls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stall(&self) {
        self.stall_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Recent source throughput in bytes/second, or 0 if the filler is
    /// recording right now.
    pub fn read_rate(&self) -> f64 {
        self.throughput
            .try_lock()
            .map(|t| t.cached_rate)
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            source_bytes: self.source_bytes.load(Ordering::Relaxed),
            source_reads: self.source_reads.load(Ordering::Relaxed),
            source_seeks: self.source_seeks.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            controls: self.controls.load(Ordering::Relaxed),
            stall_events: self.stall_events.load(Ordering::Relaxed),
            read_rate: self.read_rate(),
        }
    }
}

/// Snapshot of cache metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheMetricsSnapshot {
    pub source_bytes: u64,
    pub source_reads: u64,
    pub source_seeks: u64,
    pub flushes: u64,
    pub controls: u64,
    pub stall_events: u64,
    /// Recent source throughput (bytes/second)
    pub read_rate: f64,
}

impl CacheMetricsSnapshot {
    /// Average bytes per source read.
    pub fn avg_read_size(&self) -> u64 {
        if self.source_reads == 0 {
            0
        } else {
            self.source_bytes / self.source_reads
        }
    }
}
