//! Error types for streamcache-core.

use thiserror::Error;

/// Error type for cache operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache disabled: size is zero")]
    Disabled,

    #[error("Cache size {0} bytes is larger than the maximum allocation size")]
    TooLarge(u64),

    #[error("Failed to allocate {0} bytes of cache memory")]
    Allocation(usize),

    #[error("Starting cache filler thread failed: {0}")]
    FillerSpawn(#[source] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Cache filler is not running")]
    FillerStopped,
}

impl Error {
    /// True for errors after which the caller should fall back to uncached
    /// access to the source.
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Disabled | Error::TooLarge(_) | Error::Allocation(_) | Error::FillerSpawn(_)
        )
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
