//! Buffer refill: follow reader seeks and top up the circular buffer.

use crate::config::CacheLayout;
use crate::shared_state::CacheState;
use std::io::ErrorKind;
use streamcache_core::Source;

/// Filler-local refill state.
pub(crate) struct Refill {
    /// Sector-sized bounce buffer for reads that straddle the physical end.
    scratch: Vec<u8>,
    /// Seek epoch of a failed source seek; the source position is unknown
    /// until the reader seeks again.
    seek_failed: Option<u64>,
}

impl Refill {
    pub(crate) fn new(layout: &CacheLayout) -> Self {
        Self {
            scratch: vec![0; layout.sector_size as usize],
            seek_failed: None,
        }
    }

    /// The source was repositioned by a control command and the cache flushed
    /// to match.
    pub(crate) fn resync(&mut self) {
        self.seek_failed = None;
    }

    /// Run one refill pass. Returns the number of bytes added to the cache.
    pub(crate) fn run(&mut self, state: &CacheState, source: &mut dyn Source) -> usize {
        let store = &state.store;
        let layout = &state.layout;
        let epoch = state.seek_epoch();
        let read = store.read_filepos();

        let force_seek = match self.seek_failed {
            Some(failed) if failed == epoch => {
                state.mark_eof(epoch);
                return 0;
            }
            Some(_) => true,
            None => false,
        };

        let min = store.min_filepos();
        let max = store.max_filepos();
        if force_seek || read < min || read >= max + layout.seek_limit {
            tracing::debug!(pos = read, min, max, "seek outside cached window, flushing");
            store.flush_to(read);
            state.metrics.record_flush();
            state.metrics.record_source_seek();
            if !source.seek(read as u64) {
                tracing::warn!(pos = read, "source seek failed");
                self.seek_failed = Some(epoch);
                state.mark_eof(epoch);
                return 0;
            }
            self.seek_failed = None;
        }

        let buffer_size = layout.buffer_size;
        let min = store.min_filepos();
        let max = store.max_filepos();

        let back = (read - min).clamp(0, layout.back_size);
        let newb = (max - read).max(0);
        let mut space = buffer_size - (newb + back);
        if space < layout.fill_limit {
            return 0;
        }

        let pos = store.physical(max);
        let to_end = buffer_size - pos as i64;
        let mut wraparound = false;
        if space > to_end {
            if to_end >= layout.sector_size {
                space = to_end;
            } else {
                space = layout.sector_size;
                wraparound = true;
            }
        }

        // A zero hint means no preference.
        let chunk = source
            .read_chunk()
            .filter(|&c| c > 0)
            .map(|c| c as i64)
            .unwrap_or(4 * layout.sector_size);
        let space = space.min(chunk) as usize;

        // Evict before writing so the write region never overlaps resident
        // bytes: back + newb + space <= buffer_size.
        let max_back = buffer_size - (space as i64 + newb);
        let floor = (read - max_back).min(max);
        if min < floor {
            store.set_min_filepos(floor);
        }

        let result = if wraparound {
            let buf = &mut self.scratch[..space];
            source.read(buf).map(|n| {
                // SAFETY: the slots after `max` are outside the window after
                // eviction above.
                unsafe { store.copy_in(pos, &buf[..n]) };
                n
            })
        } else {
            // SAFETY: pos + space <= buffer_size and the slots are outside
            // the window after eviction above.
            source.read(unsafe { store.region_mut(pos, space) })
        };

        let len = match result {
            Ok(n) => n.min(space),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                return 0;
            }
            Err(e) => {
                tracing::warn!(pos = max, error = %e, "source read failed, treating as end of data");
                0
            }
        };

        state.metrics.record_source_read(len as u64);
        if len == 0 {
            state.mark_eof(epoch);
            return 0;
        }
        state.set_eof(false);

        if pos + len >= buffer_size as usize {
            store.advance_offset();
        }
        store.set_max_filepos(max + len as i64);
        len
    }
}
