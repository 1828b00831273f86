//! Circular backing store shared by the filler and the reader.
//!
//! Holds the cached bytes and the logical window they cover. There is no lock:
//! the filler only writes bytes outside `[read_filepos, max_filepos)`, the
//! reader only copies bytes inside `[min_filepos, max_filepos)`, and the
//! positions that delimit those ranges are atomics.
//!
//! Known limitation: there is no data consistency checking. A reader seek that
//! races a filler pass computed from the old read position can let the filler
//! evict history the reader is about to copy.

use crate::config::CacheLayout;
use std::ptr::{self, NonNull};
use streamcache_core::{AtomicPosition, Error, Result};

pub(crate) struct BackingStore {
    ptr: NonNull<u8>,
    len: usize,
    /// Logical position of physical slot 0 (modulo `len`).
    offset: AtomicPosition,
    min_filepos: AtomicPosition,
    max_filepos: AtomicPosition,
    read_filepos: AtomicPosition,
}

// SAFETY: byte ranges are partitioned between the filler and the reader by the
// atomic window positions, see the module docs.
unsafe impl Send for BackingStore {}
unsafe impl Sync for BackingStore {}

impl BackingStore {
    /// Allocate a zeroed store whose window starts empty at `start`.
    pub(crate) fn allocate(layout: &CacheLayout, start: i64) -> Result<Self> {
        let len = layout.buffer_size as usize;
        let mut bytes: Vec<u8> = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation(len))?;
        bytes.resize(len, 0);
        let raw = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
        let ptr = NonNull::new(raw).ok_or(Error::Allocation(len))?;

        Ok(Self {
            ptr,
            len,
            offset: AtomicPosition::new(start),
            min_filepos: AtomicPosition::new(start),
            max_filepos: AtomicPosition::new(start),
            read_filepos: AtomicPosition::new(start),
        })
    }

    #[inline]
    pub(crate) fn buffer_size(&self) -> i64 {
        self.len as i64
    }

    #[inline]
    pub(crate) fn offset(&self) -> i64 {
        self.offset.get()
    }

    #[inline]
    pub(crate) fn min_filepos(&self) -> i64 {
        self.min_filepos.get()
    }

    #[inline]
    pub(crate) fn max_filepos(&self) -> i64 {
        self.max_filepos.get()
    }

    #[inline]
    pub(crate) fn read_filepos(&self) -> i64 {
        self.read_filepos.get()
    }

    /// Reader side, or the filler while the reader waits on a position
    /// changing control.
    #[inline]
    pub(crate) fn set_read_filepos(&self, pos: i64) {
        self.read_filepos.set(pos);
    }

    /// Filler only. Evicts everything below `pos`.
    #[inline]
    pub(crate) fn set_min_filepos(&self, pos: i64) {
        self.min_filepos.set(pos);
    }

    /// Filler only. Publishes bytes written below `pos`.
    #[inline]
    pub(crate) fn set_max_filepos(&self, pos: i64) {
        self.max_filepos.set(pos);
    }

    /// Filler only. The write cursor crossed the physical end.
    #[inline]
    pub(crate) fn advance_offset(&self) {
        self.offset.fetch_add(self.buffer_size());
    }

    /// Drop all cached content; the window restarts empty at `pos`.
    ///
    /// `max` is lowered before `min` so a reader that observes the new `min`
    /// also observes an empty window.
    pub(crate) fn flush_to(&self, pos: i64) {
        self.max_filepos.set(pos);
        self.min_filepos.set(pos);
        self.offset.set(pos);
    }

    /// Physical slot of a logical position.
    #[inline]
    pub(crate) fn physical(&self, logical: i64) -> usize {
        (logical - self.offset()).rem_euclid(self.buffer_size()) as usize
    }

    /// Bytes not holding resident content.
    #[cfg(test)]
    pub(crate) fn space_free(&self) -> i64 {
        self.buffer_size() - (self.max_filepos() - self.min_filepos())
    }

    /// Bytes readable at `pos` without waiting on the filler.
    pub(crate) fn bytes_available_at(&self, pos: i64) -> i64 {
        let min = self.min_filepos();
        let max = self.max_filepos();
        if pos < min || pos > max {
            0
        } else {
            max - pos
        }
    }

    /// Copy resident bytes starting at logical `pos` into `dst`.
    ///
    /// Stops at the physical end of the buffer, so a caller wanting more
    /// copies again from the returned position. Returns 0 when `pos` is not
    /// resident.
    pub(crate) fn copy_out(&self, pos: i64, dst: &mut [u8]) -> usize {
        let available = self.bytes_available_at(pos);
        if available <= 0 || dst.is_empty() {
            return 0;
        }
        let phys = self.physical(pos);
        let n = (available as usize).min(self.len - phys).min(dst.len());
        // SAFETY: phys + n <= len, and [pos, pos + n) is resident so the
        // filler is not writing it.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr().add(phys), dst.as_mut_ptr(), n);
        }
        n
    }

    /// Copy `src` in at physical `phys`, splitting across the wrap.
    ///
    /// # Safety
    /// Filler only; the target slots must lie outside the resident window.
    pub(crate) unsafe fn copy_in(&self, phys: usize, src: &[u8]) {
        debug_assert!(src.len() <= self.len);
        let head = src.len().min(self.len - phys);
        ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr().add(phys), head);
        ptr::copy_nonoverlapping(src.as_ptr().add(head), self.ptr.as_ptr(), src.len() - head);
    }

    /// Mutable view of `len` slots starting at physical `phys`.
    ///
    /// # Safety
    /// Filler only; `phys + len` must not exceed the buffer and the slots must
    /// lie outside the resident window for the lifetime of the slice.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn region_mut(&self, phys: usize, len: usize) -> &mut [u8] {
        debug_assert!(phys + len <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(phys), len)
    }

    /// True when the window bookkeeping satisfies its invariants.
    #[cfg(test)]
    pub(crate) fn window_is_consistent(&self) -> bool {
        let min = self.min_filepos();
        let max = self.max_filepos();
        min <= max && max - min <= self.buffer_size()
    }
}

impl Drop for BackingStore {
    fn drop(&mut self) {
        // SAFETY: ptr/len came from Box::into_raw of a boxed slice of len bytes.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            )));
        }
    }
}
