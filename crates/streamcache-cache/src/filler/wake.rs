//! Best-effort wake notification for the sleeping filler.
//!
//! A `bounded(1)` channel of unit values: extra wakes coalesce into the one
//! pending slot, and a lost wake only costs one sleep interval.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Reader side. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Waker {
    tx: Sender<()>,
}

/// Filler side.
pub(crate) struct WakeListener {
    rx: Receiver<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Woken,
    TimedOut,
    /// Every waker was dropped.
    Disconnected,
}

pub(crate) fn wake_channel() -> (Waker, WakeListener) {
    let (tx, rx) = bounded(1);
    (Waker { tx }, WakeListener { rx })
}

impl Waker {
    #[inline]
    pub(crate) fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

impl WakeListener {
    /// Sleep for up to `timeout`, returning early on a wake.
    pub(crate) fn sleep(&self, timeout: Duration) -> Wake {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Wake::Woken,
            Err(RecvTimeoutError::Timeout) => Wake::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Wake::Disconnected,
        }
    }
}
