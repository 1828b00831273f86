//! State shared between the filler thread and the reader.
//!
//! Every scalar is atomic; nothing here takes a lock. Ownership is by field:
//! the filler writes the window end, offset, idle and the query cache, the
//! reader writes the read position and seek epoch.

use crate::config::CacheLayout;
use crate::metrics::CacheMetrics;
use crate::store::BackingStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use streamcache_core::{
    AtomicDouble, AtomicFlag, ControlCmd, ControlError, ControlResult, ControlValue, Result,
};

pub(crate) struct CacheState {
    pub(crate) layout: CacheLayout,
    pub(crate) store: BackingStore,
    pub(crate) metrics: CacheMetrics,
    /// Source exhausted at `max_filepos`.
    eof: AtomicBool,
    /// Bumped by every reader seek; an eof observed under an older epoch is
    /// stale.
    seek_epoch: AtomicU64,
    idle: AtomicFlag,
    /// Cleared by the filler on exit.
    running: AtomicFlag,
    shutdown: AtomicFlag,

    time_length: AtomicDouble,
    time_pos: AtomicDouble,
    start_time: AtomicDouble,
}

impl CacheState {
    pub(crate) fn new(layout: CacheLayout, start: i64) -> Result<Self> {
        Ok(Self {
            store: BackingStore::allocate(&layout, start)?,
            layout,
            metrics: CacheMetrics::new(),
            eof: AtomicBool::new(false),
            seek_epoch: AtomicU64::new(0),
            idle: AtomicFlag::new(false),
            running: AtomicFlag::new(true),
            shutdown: AtomicFlag::new(false),
            time_length: AtomicDouble::unset(),
            time_pos: AtomicDouble::unset(),
            start_time: AtomicDouble::unset(),
        })
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.eof.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn set_eof(&self, eof: bool) {
        self.eof.store(eof, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn seek_epoch(&self) -> u64 {
        self.seek_epoch.load(Ordering::SeqCst)
    }

    /// Filler side: record end of data found during a pass that started
    /// under `epoch`. Withdrawn if the reader seeked in the meantime.
    pub(crate) fn mark_eof(&self, epoch: u64) {
        self.set_eof(true);
        if self.seek_epoch() != epoch {
            self.set_eof(false);
        }
    }

    /// Reader side: move the read position and clear eof.
    pub(crate) fn begin_seek(&self, pos: i64) {
        self.store.set_read_filepos(pos);
        self.seek_epoch.fetch_add(1, Ordering::SeqCst);
        self.set_eof(false);
    }

    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        self.idle.get()
    }

    #[inline]
    pub(crate) fn set_idle(&self, idle: bool) {
        self.idle.set(idle);
    }

    #[inline]
    pub(crate) fn is_running(&self) -> bool {
        self.running.get()
    }

    pub(crate) fn set_stopped(&self) {
        self.running.set(false);
    }

    #[inline]
    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.get()
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.set(true);
    }

    /// Filler side: store refreshed time queries (`None` = unavailable).
    pub(crate) fn publish_times(&self, length: Option<f64>, pos: Option<f64>, start: Option<f64>) {
        self.time_length.set_opt(length);
        self.time_pos.set_opt(pos);
        self.start_time.set_opt(start);
    }

    /// Reader side: answer a cached time query without a filler round-trip.
    pub(crate) fn cached_query(&self, cmd: &ControlCmd) -> Option<ControlResult> {
        if !cmd.is_cached_query() {
            return None;
        }
        let slot = match cmd {
            ControlCmd::GetTimeLength => &self.time_length,
            ControlCmd::GetCurrentTime => &self.time_pos,
            _ => &self.start_time,
        };
        Some(
            slot.get_opt()
                .map(ControlValue::Double)
                .ok_or(ControlError::Unsupported),
        )
    }
}
