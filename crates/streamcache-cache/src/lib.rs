//! Read-ahead cache stream.
//!
//! Puts a fixed-size circular buffer between a slow seekable [`Source`] and a
//! consumer that wants bytes at arbitrary offsets with low latency.
//!
//! # Features
//!
//! - **Filler thread**: reads ahead into the buffer, follows seeks, and runs
//!   source control commands
//! - **Lock-free sharing**: reader and filler share the buffer through atomics
//!   only; each field has a single writer
//! - **Cheap seeks**: backward seeks into retained history and short forward
//!   seeks keep cached bytes
//! - **Interruptible waits**: every blocking call checks an [`Interrupt`]
//!
//! # Example
//!
//! ```ignore
//! use streamcache_cache::{CacheBuilder, Prefill};
//! use streamcache_core::IoSource;
//!
//! let source = IoSource::new(std::fs::File::open("movie.mkv")?).with_sector_size(2048);
//! let (mut stream, prefill) = CacheBuilder::new()
//!     .size(8 << 20)
//!     .min_prefill(512 << 10)
//!     .open(source)?;
//!
//! let mut header = [0u8; 4096];
//! stream.read(&mut header)?;
//! stream.seek(64 << 20);
//! println!("{:?}", stream.fill_level());
//! ```
//!
//! [`Source`]: streamcache_core::Source
//! [`Interrupt`]: streamcache_core::Interrupt

mod builder;
pub use builder::CacheBuilder;

mod config;
pub use config::{CacheConfig, CacheLayout, PollTiming};

mod metrics;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};

mod stream;
pub use stream::{CacheStream, FillLevel, Prefill};

mod filler;
mod request;
mod shared_state;
mod store;
