//! Fluent builder for opening a cache stream.

use crate::config::{CacheConfig, PollTiming};
use crate::stream::{CacheStream, Prefill};
use streamcache_core::{Interrupt, Result, Source};

/// Builder for [`CacheStream`].
///
/// # Example
/// ```ignore
/// let (stream, prefill) = CacheBuilder::new()
///     .size(4 << 20)
///     .min_prefill(256 << 10)
///     .seek_limit(1 << 20)
///     .interrupt(interrupt.clone())
///     .open(source)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheBuilder {
    config: CacheConfig,
    interrupt: Option<Interrupt>,
}

impl CacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set cache capacity in bytes (default: 8 MiB).
    pub fn size(mut self, bytes: u64) -> Self {
        self.config.size = bytes;
        self
    }

    /// Set bytes to buffer before `open` returns (default: 0).
    pub fn min_prefill(mut self, bytes: u64) -> Self {
        self.config.min_prefill = bytes;
        self
    }

    /// Set the forward jump within which cached content is kept
    /// (default: half the buffer).
    pub fn seek_limit(mut self, bytes: u64) -> Self {
        self.config.seek_limit = Some(bytes);
        self
    }

    /// Set the sector size assumed when the source reports none (default: 2048).
    pub fn default_sector_size(mut self, bytes: usize) -> Self {
        self.config.default_sector_size = bytes;
        self
    }

    /// Run the filler thread at maximum priority.
    pub fn filler_priority(mut self, enabled: bool) -> Self {
        self.config.filler_priority = enabled;
        self
    }

    pub fn timing(mut self, timing: PollTiming) -> Self {
        self.config.timing = timing;
        self
    }

    /// Interruption signal checked by every blocking wait (default: one that
    /// never fires unless triggered through [`CacheStream::interrupt`]).
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn build_config(&self) -> CacheConfig {
        self.config
    }

    /// Open the cache in front of `source`.
    pub fn open<S: Source + 'static>(self, source: S) -> Result<(CacheStream, Prefill)> {
        CacheStream::open(source, self.config, self.interrupt.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_sets_config() {
        let timing = PollTiming {
            read_poll: Duration::from_millis(2),
            ..Default::default()
        };
        let config = CacheBuilder::new()
            .size(1 << 20)
            .min_prefill(4096)
            .seek_limit(65536)
            .default_sector_size(4096)
            .filler_priority(true)
            .timing(timing)
            .build_config();

        assert_eq!(config.size, 1 << 20);
        assert_eq!(config.min_prefill, 4096);
        assert_eq!(config.seek_limit, Some(65536));
        assert_eq!(config.default_sector_size, 4096);
        assert!(config.filler_priority);
        assert_eq!(config.timing.read_poll, Duration::from_millis(2));
    }

    #[test]
    fn test_builder_defaults() {
        assert_eq!(CacheBuilder::new().build_config(), CacheConfig::default());
    }
}
