//! # Streamcache - Read-ahead Byte Cache
//!
//! Decouples a slow, possibly blocking, seekable source from a consumer that
//! wants bytes at arbitrary offsets with low latency.
//!
//! ## Architecture
//!
//! Streamcache is an umbrella crate over:
//! - **streamcache-core** - Source trait, control protocol, interrupts, lock-free scalars
//! - **streamcache-cache** - Cache stream, filler thread, circular backing store
//!
//! ## Quick Start
//!
//! ```ignore
//! use streamcache::prelude::*;
//!
//! let source = IoSource::new(std::fs::File::open("disc.iso")?).with_sector_size(2048);
//! let (mut stream, prefill) = CacheBuilder::new()
//!     .size(8 << 20)
//!     .min_prefill(1 << 20)
//!     .open(source)?;
//!
//! let mut buf = vec![0u8; 65536];
//! let n = stream.read(&mut buf)?;
//!
//! // Control commands run on the filler, which owns the source.
//! let length = stream.control(ControlCmd::GetTimeLength);
//! stream.close();
//! ```

/// Re-export of streamcache-core for direct access
pub use streamcache_core as core;

/// Re-export of streamcache-cache for direct access
pub use streamcache_cache as cache;

pub use streamcache_core::{
    // Control protocol
    ControlCmd,
    ControlError,
    ControlResult,
    ControlValue,
    // Error
    Error,
    // Cancellation
    Interrupt,
    // Sources
    IoSource,
    LangKind,
    Result,
    Source,
};

pub use streamcache_cache::{
    CacheBuilder, CacheConfig, CacheLayout, CacheMetricsSnapshot, CacheStream, FillLevel,
    PollTiming, Prefill,
};

/// Common imports for opening and using a cache stream.
pub mod prelude {
    pub use crate::{
        CacheBuilder, CacheConfig, CacheStream, ControlCmd, ControlError, ControlValue, Error,
        FillLevel, Interrupt, IoSource, Prefill, Result, Source,
    };
}
