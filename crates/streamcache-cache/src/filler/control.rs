//! Control commands executed on the filler's side of the mailbox.

use super::fill::Refill;
use crate::shared_state::CacheState;
use std::time::{Duration, Instant};
use streamcache_core::{ControlCmd, ControlResult, Source};

/// Outcome of executing one request.
#[derive(Debug, PartialEq)]
pub(crate) enum Executed {
    Reply(ControlResult),
    /// Reply "not supported" and leave the filler loop.
    Quit,
}

pub(crate) struct ControlExecutor {
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
}

impl ControlExecutor {
    pub(crate) fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            last_refresh: None,
        }
    }

    /// Re-query duration, current time and start time if the last refresh is
    /// older than the refresh interval.
    pub(crate) fn refresh_times(&mut self, state: &CacheState, source: &mut dyn Source) {
        if self
            .last_refresh
            .is_some_and(|t| t.elapsed() < self.refresh_interval)
        {
            return;
        }
        let mut query = |cmd: ControlCmd| source.control(&cmd).ok().and_then(|v| v.as_f64());
        let length = query(ControlCmd::GetTimeLength).filter(|&l| l > 0.0);
        let pos = query(ControlCmd::GetCurrentTime);
        let start = query(ControlCmd::GetStartTime);
        state.publish_times(length, pos, start);
        self.last_refresh = Some(Instant::now());
    }

    pub(crate) fn execute(
        &mut self,
        state: &CacheState,
        source: &mut dyn Source,
        refill: &mut Refill,
        cmd: &ControlCmd,
    ) -> Executed {
        if *cmd == ControlCmd::Quit {
            state.publish_times(None, None, None);
            return Executed::Quit;
        }
        state.metrics.record_control();

        let old_pos = source.tell();
        let old_eof = source.is_eof();
        let result = source.control(cmd);

        if cmd.changes_position() {
            match result {
                Ok(_) => {
                    // The reader is blocked waiting for this reply, so the
                    // filler may move the read position.
                    let pos = source.tell() as i64;
                    let store = &state.store;
                    store.set_read_filepos(pos);
                    state.set_eof(source.is_eof());
                    store.flush_to(pos);
                    state.metrics.record_flush();
                    refill.resync();
                    tracing::debug!(?cmd, pos, "source repositioned by control");
                }
                Err(_) if source.tell() != old_pos || source.is_eof() != old_eof => {
                    tracing::warn!(
                        ?cmd,
                        old_pos,
                        new_pos = source.tell(),
                        "control changed source position but reported failure"
                    );
                }
                Err(_) => {}
            }
        }
        Executed::Reply(result)
    }
}
