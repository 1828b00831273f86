//! Lock-free primitives for state shared between filler and reader.

use atomic_float::AtomicF64;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Cache-line aligned atomic logical byte position.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicPosition {
    value: AtomicI64,
}

impl AtomicPosition {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Returns the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel)
    }
}

impl Default for AtomicPosition {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned atomic f64.
///
/// NaN is used by the cache as "no value", see [`AtomicDouble::get_opt`].
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicDouble {
    value: AtomicF64,
}

impl AtomicDouble {
    pub fn new(value: f64) -> Self {
        Self {
            value: AtomicF64::new(value),
        }
    }

    /// An unset value.
    pub fn unset() -> Self {
        Self::new(f64::NAN)
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
    }

    /// `None` when the stored value is NaN.
    #[inline]
    pub fn get_opt(&self) -> Option<f64> {
        let v = self.get();
        (!v.is_nan()).then_some(v)
    }

    #[inline]
    pub fn set_opt(&self, value: Option<f64>) {
        self.set(value.unwrap_or(f64::NAN));
    }
}

impl Default for AtomicDouble {
    fn default() -> Self {
        Self::new(0.0)
    }
}
