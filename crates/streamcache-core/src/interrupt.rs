//! Cancellation token and the poll-with-timeout helper every blocking cache
//! wait goes through.

use crate::error::{Error, Result};
use crate::lockfree::AtomicFlag;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    triggered: AtomicFlag,
    lock: Mutex<()>,
    cond: Condvar,
}

/// Caller-supplied interruption signal.
///
/// Cloning shares the same signal. Sleeps taken through [`Interrupt::sleep`]
/// end early when the signal fires.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and wake any sleeper.
    pub fn trigger(&self) {
        self.inner.triggered.set(true);
        let _guard = self.inner.lock.lock();
        self.inner.cond.notify_all();
    }

    /// Re-arm the signal.
    pub fn reset(&self) {
        self.inner.triggered.set(false);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.get()
    }

    /// Sleep for up to `timeout`. Returns true if interrupted.
    pub fn sleep(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let mut guard = self.inner.lock.lock();
        if self.is_triggered() {
            return true;
        }
        self.inner.cond.wait_for(&mut guard, timeout);
        self.is_triggered()
    }
}

/// Outcome of a single check in [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    Pending,
}

/// Run `check` until it is ready, sleeping `interval` between attempts.
///
/// `check` receives the number of sleeps taken so far, so callers can warn
/// after a stall without tracking their own counter. The interrupt is
/// re-checked every cycle; firing it ends the wait with [`Error::Interrupted`].
pub fn poll_until<T>(
    interrupt: &Interrupt,
    interval: Duration,
    mut check: impl FnMut(u32) -> Poll<T>,
) -> Result<T> {
    let mut cycles = 0u32;
    loop {
        if let Poll::Ready(value) = check(cycles) {
            return Ok(value);
        }
        if interrupt.sleep(interval) {
            return Err(Error::Interrupted);
        }
        cycles = cycles.saturating_add(1);
    }
}
