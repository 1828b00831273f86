//! Reader-facing cache stream.

use crate::config::{CacheConfig, CacheLayout, PollTiming};
use crate::filler::{wake_channel, FillerThread, Waker};
use crate::metrics::CacheMetricsSnapshot;
use crate::request::{control_channel, ControlPort};
use crate::shared_state::CacheState;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use streamcache_core::{
    poll_until, ControlCmd, ControlError, ControlResult, Error, Interrupt, Poll, Result, Source,
};

/// Outcome of the initial prefill wait in [`CacheStream::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefill {
    /// The prefill threshold was reached, or the source ended first.
    Ready,
    /// The interrupt fired first. The stream is usable but may be partly
    /// filled.
    Interrupted,
}

/// Point-in-time view of the cache fill state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillLevel {
    /// Buffer capacity in bytes.
    pub capacity: u64,
    /// Bytes readable at the current read position without waiting.
    pub buffered: u64,
    /// True while the filler has nothing to do.
    pub idle: bool,
}

/// A read-ahead cache in front of a [`Source`].
///
/// A filler thread reads ahead into a fixed circular buffer while this
/// handle serves reads from it. Seeks inside the cached window are free;
/// seeks outside it make the filler flush and reposition the source.
///
/// # Example
/// ```ignore
/// let (mut stream, _) = CacheStream::open(source, CacheConfig::default(), Interrupt::new())?;
/// let mut buf = [0u8; 4096];
/// let n = stream.read(&mut buf)?;
/// stream.seek(1 << 20);
/// ```
pub struct CacheStream {
    state: Arc<CacheState>,
    filler: FillerThread,
    port: ControlPort,
    waker: Waker,
    interrupt: Interrupt,
    timing: PollTiming,
    /// Consumer position. Ahead of the shared read position by the sub-sector
    /// remainder of the last seek until the next read skips it.
    pos: u64,
    /// Sector-sized scratch for skipping the remainder.
    skip: Vec<u8>,
    closed: bool,
}

impl CacheStream {
    /// Attach a cache to `source` and start the filler.
    ///
    /// Blocks until `min_prefill` bytes are buffered, the source ends, or
    /// `interrupt` fires. Errors mean the cache is unavailable and the caller
    /// should read the source directly.
    pub fn open<S>(source: S, config: CacheConfig, interrupt: Interrupt) -> Result<(Self, Prefill)>
    where
        S: Source + 'static,
    {
        let layout = config.layout(source.sector_size())?;
        tracing::info!("Cache size set to {} KiB", config.size / 1024);

        let start = source.tell();
        let skip = vec![0u8; layout.sector_size as usize];
        let state = Arc::new(CacheState::new(layout, start as i64)?);
        let (port, endpoint) = control_channel();
        let (waker, listener) = wake_channel();
        let filler = FillerThread::spawn(
            Arc::clone(&state),
            Box::new(source),
            endpoint,
            listener,
            config.timing,
            config.filler_priority,
        )
        .inspect_err(|e| tracing::error!("{e}"))?;

        let stream = Self {
            state,
            filler,
            port,
            waker,
            interrupt,
            timing: config.timing,
            pos: start,
            skip,
            closed: false,
        };
        let prefill = stream.wait_prefill();
        Ok((stream, prefill))
    }

    fn wait_prefill(&self) -> Prefill {
        let state = &self.state;
        let store = &state.store;
        let wanted = state.layout.min_prefill;
        let capacity = state.layout.buffer_size as f64;

        let waited = poll_until(&self.interrupt, self.timing.prefill_poll, |_| {
            let read = store.read_filepos();
            let buffered = store.bytes_available_at(read);
            if read >= store.min_filepos() && buffered >= wanted {
                return Poll::Ready(());
            }
            // Source smaller than the prefill size.
            if state.is_eof() || !state.is_running() {
                return Poll::Ready(());
            }
            tracing::debug!(
                buffered,
                "Cache fill: {:5.2}%",
                100.0 * buffered as f64 / capacity
            );
            Poll::Pending
        });
        match waited {
            Ok(()) => Prefill::Ready,
            Err(_) => Prefill::Interrupted,
        }
    }

    /// Read up to `buf.len()` bytes at the current position.
    ///
    /// Waits for the filler until `buf` is full; returns fewer bytes only at
    /// end of data. If the interrupt fires the stream is marked at end of
    /// data, and [`Error::Interrupted`] is returned when nothing was read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let store = &self.state.store;
        let read = store.read_filepos() as u64;
        if self.pos < read || self.pos - read >= self.state.layout.sector_size as u64 {
            // The filler moved the read position behind our back, e.g. for a
            // repositioning control we stopped waiting for.
            tracing::warn!(
                pos = self.pos,
                read,
                "cache read position out of sync, seeking back"
            );
            self.seek(self.pos);
        }

        let read = self.state.store.read_filepos() as u64;
        if self.pos > read {
            let mut skip = std::mem::take(&mut self.skip);
            let remainder = &mut skip[..(self.pos - read) as usize];
            let skipped = self.copy_from_cache(remainder);
            let complete = matches!(skipped, Ok(n) if n == remainder.len());
            self.skip = skip;
            if !complete {
                return skipped.map(|_| 0);
            }
        }

        let n = self.copy_from_cache(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Copy from the shared read position until `buf` is full or data ends.
    fn copy_from_cache(&self, buf: &mut [u8]) -> Result<usize> {
        let store = &self.state.store;
        let mut total = 0;
        while total < buf.len() {
            match self.wait_for_data() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    self.state.set_eof(true);
                    if total == 0 {
                        return Err(e);
                    }
                    break;
                }
            }
            let read = store.read_filepos();
            let n = store.copy_out(read, &mut buf[total..]);
            store.set_read_filepos(read + n as i64);
            total += n;
            self.wake_if_idle();
        }
        Ok(total)
    }

    /// Wait until bytes are readable at the read position. Returns false at
    /// end of data.
    fn wait_for_data(&self) -> Result<bool> {
        let state = &self.state;
        let store = &state.store;
        let mut last_max = store.max_filepos();
        let mut stalled = 0u32;

        poll_until(&self.interrupt, self.timing.read_poll, |_| {
            if store.bytes_available_at(store.read_filepos()) > 0 {
                return Poll::Ready(true);
            }
            if state.is_eof() || !state.is_running() {
                return Poll::Ready(false);
            }

            let max = store.max_filepos();
            if max == last_max {
                stalled += 1;
                if stalled == self.timing.empty_warn_cycles {
                    state.metrics.record_stall();
                    tracing::warn!(
                        "Cache empty, consider increasing the cache size and/or prefill. \
                         [performance issue]"
                    );
                }
            } else {
                last_max = max;
                stalled = 0;
            }
            self.wake_if_idle();
            Poll::Pending
        })
    }

    /// Move to `pos`. Never blocks; the next read waits for the filler.
    pub fn seek(&mut self, pos: u64) {
        let pos = pos.min(i64::MAX as u64);
        let aligned = self.state.layout.align_down(pos);
        let store = &self.state.store;
        tracing::trace!(
            min = store.min_filepos(),
            pos,
            read = store.read_filepos(),
            max = store.max_filepos(),
            "cache seek"
        );
        self.state.begin_seek(aligned as i64);
        self.pos = pos;
        self.waker.wake();
    }

    /// Current consumer position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// True once the filler hit end of data and everything cached up to it
    /// has been read.
    pub fn is_eof(&self) -> bool {
        let store = &self.state.store;
        self.state.is_eof() && store.bytes_available_at(store.read_filepos()) == 0
    }

    /// Run a control command against the source.
    ///
    /// Duration, current time and start time are answered from values the
    /// filler refreshes periodically. Everything else is executed by the
    /// filler while this call waits. A successful seek-to-time, seek-to-chapter
    /// or set-angle moves the stream to the source's new position; on failure
    /// the position is unchanged.
    pub fn control(&mut self, cmd: ControlCmd) -> ControlResult {
        if let Some(cached) = self.state.cached_query(&cmd) {
            return cached;
        }
        if !self.state.is_running() {
            return Err(ControlError::Unsupported);
        }

        let repositions = cmd.changes_position();
        let seq = match self.port.post(cmd, &self.interrupt, self.timing.control_poll) {
            Ok(seq) => seq,
            Err(Error::Interrupted) => {
                self.state.set_eof(true);
                return Err(ControlError::Unsupported);
            }
            Err(_) => return Err(ControlError::Unsupported),
        };
        self.waker.wake();

        let port = &self.port;
        let state = &self.state;
        let warn_after = self.timing.control_warn_cycles;
        let waited = poll_until(&self.interrupt, self.timing.control_poll, |cycle| {
            if let Some(reply) = port.try_reply(seq) {
                return Poll::Ready(reply);
            }
            if !state.is_running() {
                return Poll::Ready(port.try_reply(seq).unwrap_or(Err(Error::FillerStopped)));
            }
            if cycle == warn_after {
                tracing::warn!("Cache not responding! [performance issue]");
            }
            Poll::Pending
        });

        let result = match waited {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => return Err(ControlError::Unsupported),
            Err(_) => {
                self.state.set_eof(true);
                return Err(ControlError::Unsupported);
            }
        };
        if repositions && result.is_ok() {
            self.pos = self.state.store.read_filepos() as u64;
        }
        result
    }

    /// Capacity, buffered bytes and filler idle state.
    pub fn fill_level(&self) -> FillLevel {
        let store = &self.state.store;
        FillLevel {
            capacity: self.state.layout.buffer_size as u64,
            buffered: store.bytes_available_at(store.read_filepos()) as u64,
            idle: self.state.is_idle(),
        }
    }

    /// Buffer geometry derived at open.
    pub fn layout(&self) -> &CacheLayout {
        &self.state.layout
    }

    /// Filler I/O counters.
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.state.metrics.snapshot()
    }

    /// The signal every blocking wait of this stream checks.
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// True while the filler thread is alive.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Stop the filler and release the buffer.
    ///
    /// Blocks until the filler thread has exited; a source read already in
    /// progress is allowed to finish.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state.request_shutdown();
        self.waker.wake();
        self.filler.join();
    }

    #[inline]
    fn wake_if_idle(&self) {
        if self.state.is_idle() {
            self.waker.wake();
        }
    }
}

impl Drop for CacheStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn into_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::other(other),
    }
}

impl Read for CacheStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        CacheStream::read(self, buf).map_err(into_io_error)
    }
}

impl Seek for CacheStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let size = self
                    .control(ControlCmd::GetSize)
                    .ok()
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::Unsupported, "source size is unknown")
                    })?;
                size.checked_add_signed(delta)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        CacheStream::seek(self, target);
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}
