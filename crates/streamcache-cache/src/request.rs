//! Single-slot control mailbox between the reader and the filler.
//!
//! Both directions are `bounded(1)` channels, so at most one request can be
//! queued and the reader blocks while the slot is taken. Requests carry a
//! sequence number; a reply abandoned by an interrupted wait is discarded
//! when it finally arrives instead of answering the next request.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use streamcache_core::{ControlCmd, ControlResult, Error, Interrupt, Result};

#[derive(Debug)]
pub(crate) struct ControlRequest {
    pub seq: u64,
    pub cmd: ControlCmd,
}

#[derive(Debug)]
pub(crate) struct ControlReply {
    pub seq: u64,
    pub result: ControlResult,
}

/// Reader end of the mailbox.
pub(crate) struct ControlPort {
    tx: Sender<ControlRequest>,
    rx: Receiver<ControlReply>,
    next_seq: u64,
}

/// Filler end of the mailbox.
pub(crate) struct ControlEndpoint {
    rx: Receiver<ControlRequest>,
    tx: Sender<ControlReply>,
}

/// What the filler found in the mailbox.
#[derive(Debug)]
pub(crate) enum Inbox {
    Empty,
    Request(ControlRequest),
    /// The reader end was dropped.
    Closed,
}

pub(crate) fn control_channel() -> (ControlPort, ControlEndpoint) {
    let (req_tx, req_rx) = bounded(1);
    let (reply_tx, reply_rx) = bounded(1);
    (
        ControlPort {
            tx: req_tx,
            rx: reply_rx,
            next_seq: 1,
        },
        ControlEndpoint {
            rx: req_rx,
            tx: reply_tx,
        },
    )
}

impl ControlPort {
    /// Post a request, waiting while the slot is occupied.
    ///
    /// Returns the sequence number to match the reply against.
    pub(crate) fn post(
        &mut self,
        cmd: ControlCmd,
        interrupt: &Interrupt,
        poll: Duration,
    ) -> Result<u64> {
        while self.rx.try_recv().is_ok() {}

        let seq = self.next_seq;
        self.next_seq += 1;
        let mut request = ControlRequest { seq, cmd };
        loop {
            match self.tx.send_timeout(request, poll) {
                Ok(()) => return Ok(seq),
                Err(SendTimeoutError::Timeout(r)) => {
                    if interrupt.is_triggered() {
                        return Err(Error::Interrupted);
                    }
                    request = r;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(Error::FillerStopped),
            }
        }
    }

    /// Non-blocking check for the reply to `seq`; stale replies are dropped.
    pub(crate) fn try_reply(&self, seq: u64) -> Option<Result<ControlResult>> {
        loop {
            match self.rx.try_recv() {
                Ok(reply) if reply.seq == seq => return Some(Ok(reply.result)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Err(Error::FillerStopped)),
            }
        }
    }
}

impl ControlEndpoint {
    pub(crate) fn poll(&self) -> Inbox {
        match self.rx.try_recv() {
            Ok(request) => Inbox::Request(request),
            Err(TryRecvError::Empty) => Inbox::Empty,
            Err(TryRecvError::Disconnected) => Inbox::Closed,
        }
    }

    /// Deliver a reply. Gives up after `timeout` so a reader that stopped
    /// listening cannot wedge the filler; returns false if the reader end is
    /// gone.
    pub(crate) fn reply(&self, reply: ControlReply, timeout: Duration) -> bool {
        match self.tx.send_timeout(reply, timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(stale)) => {
                tracing::debug!(seq = stale.seq, "control reply not collected, dropping");
                true
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    /// Wait for a request, used in tests that stand in for the filler.
    #[cfg(test)]
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<ControlRequest> {
        match self.rx.recv_timeout(timeout) {
            Ok(request) => Some(request),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamcache_core::{ControlError, ControlValue};

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn test_request_reply_roundtrip() {
        let (mut port, endpoint) = control_channel();
        let interrupt = Interrupt::new();

        let seq = port.post(ControlCmd::GetSize, &interrupt, POLL).unwrap();
        let request = match endpoint.poll() {
            Inbox::Request(r) => r,
            other => panic!("expected request, got {:?}", other),
        };
        assert_eq!(request.seq, seq);
        assert_eq!(request.cmd, ControlCmd::GetSize);

        assert!(endpoint.reply(
            ControlReply {
                seq,
                result: Ok(ControlValue::Uint(42)),
            },
            POLL,
        ));
        assert_eq!(port.try_reply(seq).unwrap().unwrap(), Ok(ControlValue::Uint(42)));
    }

    #[test]
    fn test_empty_inbox() {
        let (_port, endpoint) = control_channel();
        assert!(matches!(endpoint.poll(), Inbox::Empty));
    }

    #[test]
    fn test_stale_reply_discarded() {
        let (mut port, endpoint) = control_channel();
        let interrupt = Interrupt::new();

        let first = port.post(ControlCmd::GetNumTitles, &interrupt, POLL).unwrap();
        let _ = endpoint.recv_timeout(POLL).unwrap();
        endpoint.reply(
            ControlReply {
                seq: first,
                result: Ok(ControlValue::Uint(1)),
            },
            POLL,
        );

        // The reader gave up on `first`; the next request must not see its reply.
        let second = port.post(ControlCmd::GetNumChapters, &interrupt, POLL).unwrap();
        assert!(second > first);
        assert!(port.try_reply(second).is_none());

        let request = endpoint.recv_timeout(POLL).unwrap();
        assert_eq!(request.cmd, ControlCmd::GetNumChapters);
        endpoint.reply(
            ControlReply {
                seq: second,
                result: Err(ControlError::Unsupported),
            },
            POLL,
        );
        assert_eq!(
            port.try_reply(second).unwrap().unwrap(),
            Err(ControlError::Unsupported)
        );
    }

    #[test]
    fn test_post_blocks_on_full_slot_until_interrupted() {
        let (mut port, _endpoint) = control_channel();
        let interrupt = Interrupt::new();
        port.post(ControlCmd::GetAngle, &interrupt, POLL).unwrap();

        interrupt.trigger();
        assert!(matches!(
            port.post(ControlCmd::GetAngle, &interrupt, POLL),
            Err(Error::Interrupted)
        ));
    }

    #[test]
    fn test_disconnect_detected_both_ways() {
        let (mut port, endpoint) = control_channel();
        drop(endpoint);
        assert!(matches!(
            port.post(ControlCmd::GetSize, &Interrupt::new(), POLL),
            Err(Error::FillerStopped)
        ));

        let (port, endpoint) = control_channel();
        drop(port);
        assert!(matches!(endpoint.poll(), Inbox::Closed));
        assert!(!endpoint.reply(
            ControlReply {
                seq: 1,
                result: Ok(ControlValue::None),
            },
            POLL,
        ));
    }
}
