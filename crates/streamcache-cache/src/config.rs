//! Cache sizing and timing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use streamcache_core::{Error, Result, DEFAULT_SECTOR_SIZE};

/// Smallest buffer, in sectors, the cache will allocate.
const MIN_SECTORS: u64 = 32;

/// Configuration for cache capacity, prefill and seek behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total cache capacity in bytes (default: 8 MiB)
    pub size: u64,
    /// Bytes buffered before `open` returns (default: 0, meaning "filler is up")
    pub min_prefill: u64,
    /// Forward jump below which cached content is kept (default: half the buffer)
    pub seek_limit: Option<u64>,
    /// Sector size used when the source reports none (default: 2048)
    pub default_sector_size: usize,
    /// Run the filler at maximum thread priority (default: false)
    pub filler_priority: bool,
    pub timing: PollTiming,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: 8 * 1024 * 1024,
            min_prefill: 0,
            seek_limit: None,
            default_sector_size: DEFAULT_SECTOR_SIZE,
            filler_priority: false,
            timing: PollTiming::default(),
        }
    }
}

/// Sleep intervals and stall thresholds for the filler and reader waits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollTiming {
    /// Reader poll while waiting for data (default: 10ms)
    pub read_poll: Duration,
    /// Reader poll while waiting for a control reply (default: 1ms)
    pub control_poll: Duration,
    /// Poll while waiting for the initial prefill (default: 200ms)
    pub prefill_poll: Duration,
    /// Short filler sleep used right after work stops (default: 1ms)
    pub burst_sleep: Duration,
    /// Number of short sleeps before switching to `idle_sleep` (default: 10)
    pub burst_count: u32,
    /// Filler sleep once idle (default: 50ms)
    pub idle_sleep: Duration,
    /// Minimum interval between refreshes of cached time queries (default: 100ms)
    pub query_refresh: Duration,
    /// Empty-buffer poll cycles before warning about an undersized cache (default: 10)
    pub empty_warn_cycles: u32,
    /// Control poll cycles before warning that the filler is not responding (default: 1000)
    pub control_warn_cycles: u32,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            read_poll: Duration::from_millis(10),
            control_poll: Duration::from_millis(1),
            prefill_poll: Duration::from_millis(200),
            burst_sleep: Duration::from_millis(1),
            burst_count: 10,
            idle_sleep: Duration::from_millis(50),
            query_refresh: Duration::from_millis(100),
            empty_warn_cycles: 10,
            control_warn_cycles: 1000,
        }
    }
}

impl PollTiming {
    /// Filler sleep for the given number of consecutive idle passes.
    pub fn idle_interval(&self, idle_passes: u32) -> Duration {
        if idle_passes < self.burst_count {
            self.burst_sleep
        } else {
            self.idle_sleep
        }
    }
}

impl CacheConfig {
    /// Create config with a custom capacity.
    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Derive the buffer geometry for a source with the given sector size.
    pub fn layout(&self, sector_size: Option<usize>) -> Result<CacheLayout> {
        if self.size == 0 {
            return Err(Error::Disabled);
        }
        let max_alloc = isize::MAX as u64;
        if self.size > max_alloc {
            return Err(Error::TooLarge(self.size));
        }

        let sector = sector_size
            .filter(|&s| s > 0)
            .unwrap_or(self.default_sector_size) as u64;
        if sector == 0 {
            return Err(Error::InvalidConfig("sector size must be non-zero".into()));
        }

        let sectors = (self.size / sector).max(MIN_SECTORS);
        let buffer_size = sectors
            .checked_mul(sector)
            .filter(|&b| b <= max_alloc)
            .ok_or(Error::TooLarge(self.size))?;

        let fill_limit = 8 * sector;
        let fill_ceiling = buffer_size - fill_limit;
        let seek_limit = self.seek_limit.unwrap_or(buffer_size / 2).min(fill_ceiling);
        let min_prefill = self.min_prefill.min(fill_ceiling).max(1);

        Ok(CacheLayout {
            buffer_size: buffer_size as i64,
            sector_size: sector as i64,
            back_size: (buffer_size / 2) as i64,
            fill_limit: fill_limit as i64,
            seek_limit: seek_limit as i64,
            min_prefill: min_prefill as i64,
        })
    }
}

/// Fixed buffer geometry of an open cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLayout {
    /// Capacity in bytes, a multiple of `sector_size`.
    pub buffer_size: i64,
    pub sector_size: i64,
    /// History kept behind the read position for cheap backward seeks.
    pub back_size: i64,
    /// Minimum free space before the filler reads again.
    pub fill_limit: i64,
    /// Forward jump within which cached content is kept.
    pub seek_limit: i64,
    /// Bytes buffered before `open` returns.
    pub min_prefill: i64,
}

impl CacheLayout {
    /// Align a logical position down to a sector boundary.
    #[inline]
    pub fn align_down(&self, pos: u64) -> u64 {
        let sector = self.sector_size as u64;
        pos / sector * sector
    }
}
