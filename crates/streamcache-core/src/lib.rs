//! Core types shared by the read-ahead stream cache.
//!
//! # Primary API
//!
//! - [`Source`]: the slow, seekable byte source the cache sits in front of
//! - [`IoSource`]: adapter turning any `Read + Seek` into a [`Source`]
//! - [`ControlCmd`] / [`ControlValue`] / [`ControlError`]: source control protocol
//! - [`Interrupt`]: cancellation token checked by every blocking wait
//! - [`AtomicPosition`], [`AtomicFlag`], [`AtomicDouble`]: lock-free scalars
//!
//! # Example
//!
//! ```ignore
//! use streamcache_core::{IoSource, Source};
//! use std::io::Cursor;
//!
//! let mut source = IoSource::new(Cursor::new(vec![0u8; 4096])).with_sector_size(2048);
//! let mut buf = [0u8; 512];
//! let n = source.read(&mut buf)?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod control;
pub use control::{ControlCmd, ControlError, ControlResult, ControlValue, LangKind};

mod interrupt;
pub use interrupt::{poll_until, Interrupt, Poll};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicPosition};

mod source;
pub use source::{IoSource, Source};

/// Sector size assumed when a source does not report one.
pub const DEFAULT_SECTOR_SIZE: usize = 2048;
