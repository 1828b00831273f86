//! Filler thread: keeps the cache topped up and serves control requests.

use super::control::{ControlExecutor, Executed};
use super::fill::Refill;
use super::wake::{Wake, WakeListener};
use crate::config::PollTiming;
use crate::request::{ControlEndpoint, ControlReply, Inbox};
use crate::shared_state::CacheState;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use streamcache_core::{ControlError, Error, Result, Source};
use thread_priority::ThreadPriority;

/// How long the filler waits to hand over a reply before dropping it.
const REPLY_TIMEOUT: Duration = Duration::from_millis(100);

pub(crate) struct FillerThread {
    handle: Option<JoinHandle<()>>,
}

impl FillerThread {
    pub(crate) fn spawn(
        state: Arc<CacheState>,
        source: Box<dyn Source>,
        endpoint: ControlEndpoint,
        listener: WakeListener,
        timing: PollTiming,
        high_priority: bool,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("streamcache-filler".into())
            .spawn(move || {
                if high_priority {
                    if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max)
                    {
                        tracing::debug!(error = ?e, "could not raise filler thread priority");
                    }
                }
                filler_loop(state, source, endpoint, listener, timing);
            })
            .map_err(Error::FillerSpawn)?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the thread to exit. The caller must already have asked it to.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("cache filler thread panicked");
            }
        }
    }
}

/// Marks the filler stopped however the loop ends, including by panic.
struct StopGuard(Arc<CacheState>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.set_idle(true);
        self.0.set_stopped();
    }
}

fn filler_loop(
    state: Arc<CacheState>,
    mut source: Box<dyn Source>,
    endpoint: ControlEndpoint,
    listener: WakeListener,
    timing: PollTiming,
) {
    let _guard = StopGuard(Arc::clone(&state));
    let mut refill = Refill::new(&state.layout);
    let mut executor = ControlExecutor::new(timing.query_refresh);
    let mut idle_passes = 0u32;

    loop {
        if state.shutdown_requested() {
            tracing::debug!("cache filler shutting down");
            break;
        }

        if refill.run(&state, source.as_mut()) > 0 {
            idle_passes = 0;
            state.set_idle(false);
        } else {
            state.set_idle(true);
            let interval = timing.idle_interval(idle_passes);
            idle_passes = idle_passes.saturating_add(1);
            if listener.sleep(interval) == Wake::Disconnected {
                tracing::warn!("cache stream went away, filler exiting");
                break;
            }
        }

        executor.refresh_times(&state, source.as_mut());

        let request = match endpoint.poll() {
            Inbox::Empty => continue,
            Inbox::Request(request) => request,
            Inbox::Closed => {
                tracing::warn!("cache stream went away, filler exiting");
                break;
            }
        };

        let executed = executor.execute(&state, source.as_mut(), &mut refill, &request.cmd);
        let (result, quit) = match executed {
            Executed::Reply(result) => (result, false),
            Executed::Quit => (Err(ControlError::Unsupported), true),
        };
        let delivered = endpoint.reply(
            ControlReply {
                seq: request.seq,
                result,
            },
            REPLY_TIMEOUT,
        );
        if quit {
            tracing::debug!("quit requested, filler exiting");
            break;
        }
        if !delivered {
            tracing::warn!("cache stream went away, filler exiting");
            break;
        }
    }
}
