//! The byte source the cache prefetches from.

use crate::control::{ControlCmd, ControlError, ControlResult, ControlValue};
use std::io::{self, Read, Seek, SeekFrom};

/// A slow, possibly blocking, seekable byte source.
///
/// Only the cache's filler thread touches the source once the cache is open,
/// so implementations may block for as long as they need.
pub trait Source: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of data.
    ///
    /// `ErrorKind::Interrupted` and `ErrorKind::WouldBlock` are retried on the
    /// next filler pass; any other error ends the data at this position.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Seek to an absolute byte position. Returns false on failure.
    fn seek(&mut self, pos: u64) -> bool;

    /// Current byte position.
    fn tell(&self) -> u64;

    fn is_eof(&self) -> bool;

    /// Execute a source-specific control command.
    fn control(&mut self, _cmd: &ControlCmd) -> ControlResult {
        Err(ControlError::Unsupported)
    }

    /// Alignment granularity for seeks, if the source has one.
    fn sector_size(&self) -> Option<usize> {
        None
    }

    /// Preferred size of a single read, if the source has one.
    fn read_chunk(&self) -> Option<usize> {
        None
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, pos: u64) -> bool {
        (**self).seek(pos)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }

    fn is_eof(&self) -> bool {
        (**self).is_eof()
    }

    fn control(&mut self, cmd: &ControlCmd) -> ControlResult {
        (**self).control(cmd)
    }

    fn sector_size(&self) -> Option<usize> {
        (**self).sector_size()
    }

    fn read_chunk(&self) -> Option<usize> {
        (**self).read_chunk()
    }
}

/// [`Source`] over any `Read + Seek`, e.g. a `File` or `Cursor`.
///
/// Answers [`ControlCmd::GetSize`]; every other control is unsupported.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
    pos: u64,
    eof: bool,
    sector_size: Option<usize>,
    read_chunk: Option<usize>,
}

impl<R: Read + Seek + Send> IoSource<R> {
    /// Wrap a reader positioned at byte 0.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            eof: false,
            sector_size: None,
            read_chunk: None,
        }
    }

    pub fn with_sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = (sector_size > 0).then_some(sector_size);
        self
    }

    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = (read_chunk > 0).then_some(read_chunk);
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn size(&mut self) -> io::Result<u64> {
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(end)
    }
}

impl<R: Read + Seek + Send> Source for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        self.eof = n == 0 && !buf.is_empty();
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> bool {
        match self.inner.seek(SeekFrom::Start(pos)) {
            Ok(p) => {
                self.pos = p;
                self.eof = false;
                true
            }
            Err(_) => {
                self.eof = true;
                false
            }
        }
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn control(&mut self, cmd: &ControlCmd) -> ControlResult {
        match cmd {
            ControlCmd::GetSize => self
                .size()
                .map(ControlValue::Uint)
                .map_err(|_| ControlError::Failed),
            _ => Err(ControlError::Unsupported),
        }
    }

    fn sector_size(&self) -> Option<usize> {
        self.sector_size
    }

    fn read_chunk(&self) -> Option<usize> {
        self.read_chunk
    }
}
