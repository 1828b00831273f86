//! Test helpers and fixtures for streamcache integration tests
//!
//! Provides an in-memory [`TestSource`] with knobs for blocking reads,
//! scripted chapter seeks and a settable playback clock, plus shared
//! counters the tests inspect from outside the filler thread.

#![allow(dead_code)]

use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamcache::core::AtomicDouble;
use streamcache::prelude::*;
use streamcache::PollTiming;
use tracing_subscriber::EnvFilter;

/// Sector size reported by [`TestSource`].
pub const TEST_SECTOR_SIZE: usize = 2048;

/// Bytes between chapter starts in [`TestSource`].
pub const CHAPTER_SIZE: u64 = 50_000;

/// Install a test-writer subscriber once. `RUST_LOG` overrides the default
/// `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Reproducible pseudo-random content.
pub fn pattern_data(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Counters and switches shared between a test and its [`TestSource`].
#[derive(Debug)]
pub struct SourceProbe {
    pub reads: AtomicUsize,
    pub seeks: AtomicUsize,
    pub time_queries: AtomicUsize,
    /// While set, reads fail with `WouldBlock`.
    pub blocked: AtomicBool,
    /// Failed chapter seeks still move the source position.
    pub drift_on_failure: AtomicBool,
    /// Delay applied to title-count queries and chapter seeks.
    pub slow_control_ms: AtomicUsize,
    pub clock: AtomicDouble,
}

/// In-memory source with scripted control behaviour.
///
/// Chapter `n` starts at `n * CHAPTER_SIZE`; seeking to a chapter past the end
/// fails.
pub struct TestSource {
    data: Vec<u8>,
    pos: u64,
    eof: bool,
    probe: Arc<SourceProbe>,
}

impl TestSource {
    pub fn new(data: Vec<u8>) -> (Self, Arc<SourceProbe>) {
        let probe = Arc::new(SourceProbe {
            reads: AtomicUsize::new(0),
            seeks: AtomicUsize::new(0),
            time_queries: AtomicUsize::new(0),
            blocked: AtomicBool::new(false),
            drift_on_failure: AtomicBool::new(false),
            slow_control_ms: AtomicUsize::new(0),
            clock: AtomicDouble::new(0.0),
        });
        let source = Self {
            data,
            pos: 0,
            eof: false,
            probe: Arc::clone(&probe),
        };
        (source, probe)
    }

    fn num_chapters(&self) -> u64 {
        (self.data.len() as u64).div_ceil(CHAPTER_SIZE)
    }
}

impl Source for TestSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.probe.blocked.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        let start = (self.pos as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        self.eof = n == 0;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> bool {
        self.probe.seeks.fetch_add(1, Ordering::SeqCst);
        self.pos = pos;
        self.eof = false;
        true
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn control(&mut self, cmd: &ControlCmd) -> streamcache::ControlResult {
        match cmd {
            ControlCmd::GetCurrentTime => {
                self.probe.time_queries.fetch_add(1, Ordering::SeqCst);
                Ok(ControlValue::Double(self.probe.clock.get()))
            }
            ControlCmd::GetTimeLength => Ok(ControlValue::Double(3600.0)),
            ControlCmd::GetSize => Ok(ControlValue::Uint(self.data.len() as u64)),
            ControlCmd::GetNumChapters => Ok(ControlValue::Uint(self.num_chapters())),
            ControlCmd::GetNumTitles => {
                let delay = self.probe.slow_control_ms.load(Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(delay as u64));
                Ok(ControlValue::Uint(1))
            }
            ControlCmd::GetLang { id, .. } if *id == 1 => Ok(ControlValue::Lang("en".into())),
            ControlCmd::SeekToChapter(n) => {
                let delay = self.probe.slow_control_ms.load(Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(delay as u64));
                let n = *n as u64;
                if n < self.num_chapters() {
                    self.pos = n * CHAPTER_SIZE;
                    self.eof = false;
                    Ok(ControlValue::None)
                } else {
                    if self.probe.drift_on_failure.load(Ordering::SeqCst) {
                        self.pos = 1;
                    }
                    Err(ControlError::Failed)
                }
            }
            _ => Err(ControlError::Unsupported),
        }
    }

    fn sector_size(&self) -> Option<usize> {
        Some(TEST_SECTOR_SIZE)
    }
}

/// Timings short enough that tests do not sit in 50ms idle sleeps.
pub fn fast_timing() -> PollTiming {
    PollTiming {
        prefill_poll: Duration::from_millis(5),
        idle_sleep: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Open a 64 KiB cache over `data`.
pub fn open_cache(data: &[u8], min_prefill: u64) -> (CacheStream, Arc<SourceProbe>) {
    init_tracing();
    let (source, probe) = TestSource::new(data.to_vec());
    let (stream, prefill) = CacheBuilder::new()
        .size(65536)
        .min_prefill(min_prefill)
        .timing(fast_timing())
        .open(source)
        .expect("Failed to open cache");
    assert_eq!(prefill, Prefill::Ready);
    (stream, probe)
}

/// Read exactly `len` bytes or fewer at end of data.
pub fn read_len(stream: &mut CacheStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let n = stream.read(&mut buf).expect("cache read failed");
    buf.truncate(n);
    buf
}

/// Poll `cond` every millisecond for up to `max_wait_ms`.
pub fn wait_until(max_wait_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Wait until the filler has nothing left to do.
pub fn wait_for_idle(stream: &CacheStream) {
    assert!(
        wait_until(5000, || {
            let level = stream.fill_level();
            level.idle && level.buffered > 0
        }),
        "filler never went idle"
    );
}
