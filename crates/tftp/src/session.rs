//! Per-transfer state machine
//!
//! A [`Session`] drives one read transfer in lock-step: at most one DATA or OACK
//! packet is outstanding, and it is retransmitted only when the retransmission
//! timer fires. Out-of-order and duplicate ACKs are ignored outright, which keeps a
//! delayed ACK from doubling every subsequent block (the "Sorcerer's Apprentice"
//! bug of RFC 1350).
//!
//! The machine does no network I/O and owns no timer. [`Session::handle`] takes an
//! [`Event`] and returns the [`Step`] the driver has to carry out. Only
//! [`Step::Send`] and [`Step::Retransmit`] rearm the retransmission deadline.

use std::fmt;
use std::io::{self, Read};
use std::net::SocketAddr;

use thiserror::Error;

use crate::options::Negotiated;
use crate::protocol::{Packet, TftpErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// OACK sent, waiting for ACK 0
    AwaitingOptionAck,
    /// DATA sent, waiting for its ACK
    Sending,
    Completed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingOptionAck => "awaiting-oack-ack",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A decoded packet from the transfer's own client
    Packet(Packet),
    /// The retransmission deadline passed without a matching ACK
    Timeout,
    /// Operator-driven cancellation
    Shutdown,
}

/// What the driver must do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Transmit a new packet and rearm the deadline
    Send(Packet),
    /// Transmit the previous packet again and rearm the deadline
    Retransmit(Packet),
    /// Nothing to send; the deadline keeps running
    Ignore,
    /// The final block was acknowledged
    Complete,
    /// The transfer is over; send `reply` if present
    Abort { reason: AbortReason, reply: Option<Packet> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("no acknowledgment after {retries} retransmissions")]
    RetriesExhausted { retries: u32 },

    #[error("client sent error {code}: {message}")]
    PeerError { code: u16, message: String },

    #[error("file read failed: {0}")]
    ReadFailed(String),

    #[error("socket failure: {0}")]
    Socket(String),

    #[error("server shutting down")]
    Shutdown,
}

/// Counters reported when a transfer ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// DATA blocks sent, not counting retransmissions
    pub blocks: u64,
    pub bytes: u64,
    pub retransmissions: u64,
}

pub struct Session {
    client: SocketAddr,
    source: Box<dyn Read + Send>,
    block_size: u16,
    max_retries: u32,
    state: SessionState,
    expected_ack: u16,
    last_sent: Option<Packet>,
    last_payload_len: usize,
    retries: u32,
    stats: TransferStats,
}

impl Session {
    /// Create the session for an accepted read request and produce its first packet:
    /// an OACK when options were accepted, DATA block 1 otherwise.
    pub fn begin(
        client: SocketAddr,
        source: Box<dyn Read + Send>,
        negotiated: &Negotiated,
        max_retries: u32,
    ) -> (Self, Step) {
        let mut session = Self {
            client,
            source,
            block_size: negotiated.block_size,
            max_retries,
            state: SessionState::AwaitingOptionAck,
            expected_ack: 0,
            last_sent: None,
            last_payload_len: 0,
            retries: 0,
            stats: TransferStats::default(),
        };

        let step = if negotiated.has_options() {
            let oack = Packet::OptionAck {
                options: negotiated.to_pairs(),
            };
            session.last_sent = Some(oack.clone());
            Step::Send(oack)
        } else {
            session.send_block(1)
        };

        (session, step)
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn expected_ack(&self) -> u16 {
        self.expected_ack
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Advance the machine by one event.
    pub fn handle(&mut self, event: Event) -> Step {
        if self.state.is_terminal() {
            return Step::Ignore;
        }

        match event {
            Event::Packet(Packet::Acknowledge { block }) => self.on_ack(block),
            Event::Packet(Packet::Error { code, message }) => self.abort(AbortReason::PeerError { code, message }, None),
            Event::Packet(other) => {
                tracing::debug!("Ignoring unexpected {} from {}", other.opcode(), self.client);
                Step::Ignore
            }
            Event::Timeout => self.on_timeout(),
            Event::Shutdown => self.abort(AbortReason::Shutdown, None),
        }
    }

    /// Terminate the session from outside the protocol flow (e.g. a dead socket).
    pub fn abort(&mut self, reason: AbortReason, reply: Option<Packet>) -> Step {
        self.state = SessionState::Aborted;
        Step::Abort { reason, reply }
    }

    fn on_ack(&mut self, block: u16) -> Step {
        match self.state {
            SessionState::AwaitingOptionAck if block == 0 => self.send_block(1),
            SessionState::Sending if block == self.expected_ack => {
                if self.last_payload_len < usize::from(self.block_size) {
                    self.state = SessionState::Completed;
                    Step::Complete
                } else {
                    self.send_block(self.expected_ack.wrapping_add(1))
                }
            }
            _ => {
                tracing::trace!(
                    "Ignoring ACK #{} from {} (expecting #{})",
                    block,
                    self.client,
                    self.expected_ack
                );
                Step::Ignore
            }
        }
    }

    fn on_timeout(&mut self) -> Step {
        let Some(packet) = self.last_sent.clone() else {
            return self.abort(AbortReason::RetriesExhausted { retries: self.retries }, None);
        };

        if self.retries >= self.max_retries {
            return self.abort(AbortReason::RetriesExhausted { retries: self.retries }, None);
        }

        self.retries += 1;
        self.stats.retransmissions += 1;
        Step::Retransmit(packet)
    }

    fn send_block(&mut self, block: u16) -> Step {
        let payload = match read_block(&mut self.source, usize::from(self.block_size)) {
            Ok(payload) => payload,
            Err(e) => {
                let reply = Packet::error(TftpErrorCode::NotDefined, e.to_string());
                return self.abort(AbortReason::ReadFailed(e.to_string()), Some(reply));
            }
        };

        self.state = SessionState::Sending;
        self.expected_ack = block;
        self.last_payload_len = payload.len();
        self.retries = 0;
        self.stats.blocks += 1;
        self.stats.bytes += payload.len() as u64;

        let packet = Packet::Data { block, payload };
        self.last_sent = Some(packet.clone());
        Step::Send(packet)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("state", &self.state)
            .field("block_size", &self.block_size)
            .field("expected_ack", &self.expected_ack)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

/// Read exactly one block, or less at end of file.
fn read_block(source: &mut dyn Read, block_size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(block_size);
    source.take(block_size as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::*;
    use crate::options::TftpOption;

    const CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000);

    fn defaults() -> Negotiated {
        Negotiated {
            accepted: vec![],
            block_size: 512,
            timeout: Duration::from_secs(3),
        }
    }

    fn with_blksize(size: u16) -> Negotiated {
        Negotiated {
            accepted: vec![TftpOption::BlockSize(size)],
            block_size: size,
            timeout: Duration::from_secs(3),
        }
    }

    fn file(len: usize) -> Box<dyn Read + Send> {
        Box::new(Cursor::new((0..len).map(|i| i as u8).collect::<Vec<u8>>()))
    }

    fn ack(block: u16) -> Event {
        Event::Packet(Packet::Acknowledge { block })
    }

    fn data_of(step: &Step) -> (u16, usize) {
        match step {
            Step::Send(Packet::Data { block, payload }) | Step::Retransmit(Packet::Data { block, payload }) => {
                (*block, payload.len())
            }
            other => panic!("expected DATA, got {other:?}"),
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_thousand_byte_file_without_options() {
        let (mut session, first) = Session::begin(CLIENT, file(1000), &defaults(), 5);
        assert_eq!(data_of(&first), (1, 512));
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(session.expected_ack(), 1);

        let second = session.handle(ack(1));
        assert_eq!(data_of(&second), (2, 488));

        assert_eq!(session.handle(ack(2)), Step::Complete);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(
            session.stats(),
            TransferStats {
                blocks: 2,
                bytes: 1000,
                retransmissions: 0
            }
        );
    }

    #[test]
    fn test_first_block_is_whole_small_file() {
        let (mut session, first) = Session::begin(CLIENT, file(100), &defaults(), 5);
        assert_eq!(data_of(&first), (1, 100));
        assert_eq!(session.handle(ack(1)), Step::Complete);
    }

    #[test]
    fn test_payload_carries_file_bytes() {
        let (_, first) = Session::begin(CLIENT, file(10), &defaults(), 5);
        assert_eq!(
            first,
            Step::Send(Packet::Data {
                block: 1,
                payload: (0..10).collect()
            })
        );
    }

    #[test]
    fn test_empty_file_sends_one_empty_block() {
        let (mut session, first) = Session::begin(CLIENT, file(0), &defaults(), 5);
        assert_eq!(data_of(&first), (1, 0));
        assert_eq!(session.handle(ack(1)), Step::Complete);
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_block() {
        let (mut session, first) = Session::begin(CLIENT, file(1024), &defaults(), 5);
        assert_eq!(data_of(&first), (1, 512));
        assert_eq!(data_of(&session.handle(ack(1))), (2, 512));
        assert_eq!(data_of(&session.handle(ack(2))), (3, 0));
        assert_eq!(session.handle(ack(3)), Step::Complete);
    }

    #[test]
    fn test_option_ack_handshake() {
        let (mut session, first) = Session::begin(CLIENT, file(3000), &with_blksize(1024), 5);
        assert_eq!(
            first,
            Step::Send(Packet::OptionAck {
                options: vec![("blksize".to_string(), "1024".to_string())]
            })
        );
        assert_eq!(session.state(), SessionState::AwaitingOptionAck);
        assert_eq!(session.expected_ack(), 0);

        // only ACK 0 answers an OACK
        assert_eq!(session.handle(ack(1)), Step::Ignore);
        assert_eq!(session.state(), SessionState::AwaitingOptionAck);

        assert_eq!(data_of(&session.handle(ack(0))), (1, 1024));
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(data_of(&session.handle(ack(1))), (2, 1024));
        assert_eq!(data_of(&session.handle(ack(2))), (3, 952));
        assert_eq!(session.handle(ack(3)), Step::Complete);
    }

    #[test]
    fn test_oack_is_retransmitted_on_timeout() {
        let (mut session, first) = Session::begin(CLIENT, file(10), &with_blksize(1024), 5);
        let Step::Send(oack) = first else {
            panic!("expected OACK");
        };
        assert_eq!(session.handle(Event::Timeout), Step::Retransmit(oack));
        assert_eq!(session.retries(), 1);

        assert_eq!(data_of(&session.handle(ack(0))), (1, 10));
        assert_eq!(session.retries(), 0);
    }

    #[test]
    fn test_stray_ack_is_ignored() {
        let (mut session, _) = Session::begin(CLIENT, file(4096), &defaults(), 5);
        session.handle(ack(1));
        session.handle(ack(2));
        assert_eq!(session.expected_ack(), 3);

        assert_eq!(session.handle(ack(7)), Step::Ignore);
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(session.expected_ack(), 3);
        assert_eq!(session.retries(), 0);
    }

    #[test]
    fn test_duplicate_ack_keeps_retry_state() {
        let (mut session, _) = Session::begin(CLIENT, file(4096), &defaults(), 5);
        assert_eq!(data_of(&session.handle(ack(1))), (2, 512));

        assert_eq!(data_of(&session.handle(Event::Timeout)), (2, 512));
        assert_eq!(session.retries(), 1);

        // a late duplicate of ACK 1 neither retransmits nor resets the retry count
        assert_eq!(session.handle(ack(1)), Step::Ignore);
        assert_eq!(session.retries(), 1);

        assert_eq!(data_of(&session.handle(ack(2))), (3, 512));
        assert_eq!(session.retries(), 0);
        assert_eq!(session.stats().retransmissions, 1);
    }

    #[test]
    fn test_retries_are_bounded() {
        let (mut session, first) = Session::begin(CLIENT, file(600), &defaults(), 5);
        let Step::Send(packet) = first else {
            panic!("expected DATA");
        };

        for attempt in 1..=5 {
            assert_eq!(session.handle(Event::Timeout), Step::Retransmit(packet.clone()));
            assert_eq!(session.retries(), attempt);
        }

        assert_eq!(
            session.handle(Event::Timeout),
            Step::Abort {
                reason: AbortReason::RetriesExhausted { retries: 5 },
                reply: None
            }
        );
        assert_eq!(session.state(), SessionState::Aborted);

        // nothing more once aborted
        assert_eq!(session.handle(Event::Timeout), Step::Ignore);
        assert_eq!(session.handle(ack(1)), Step::Ignore);
    }

    #[test]
    fn test_peer_error_aborts_silently() {
        let (mut session, _) = Session::begin(CLIENT, file(10), &with_blksize(1024), 5);
        let step = session.handle(Event::Packet(Packet::Error {
            code: 8,
            message: "bad options".into(),
        }));
        assert_eq!(
            step,
            Step::Abort {
                reason: AbortReason::PeerError {
                    code: 8,
                    message: "bad options".into()
                },
                reply: None
            }
        );
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[test]
    fn test_shutdown_aborts() {
        let (mut session, _) = Session::begin(CLIENT, file(10), &defaults(), 5);
        assert!(matches!(
            session.handle(Event::Shutdown),
            Step::Abort {
                reason: AbortReason::Shutdown,
                reply: None
            }
        ));
    }

    #[test]
    fn test_other_packets_are_ignored() {
        let (mut session, _) = Session::begin(CLIENT, file(1000), &defaults(), 5);
        let data = Event::Packet(Packet::Data {
            block: 1,
            payload: vec![1, 2, 3],
        });
        assert_eq!(session.handle(data), Step::Ignore);
        assert_eq!(session.expected_ack(), 1);
        assert_eq!(session.state(), SessionState::Sending);
    }

    #[test]
    fn test_read_failure_aborts_with_error_packet() {
        let (session, first) = Session::begin(CLIENT, Box::new(FailingReader), &defaults(), 5);
        match first {
            Step::Abort {
                reason: AbortReason::ReadFailed(_),
                reply: Some(Packet::Error { code, .. }),
            } => assert_eq!(code, TftpErrorCode::NotDefined.as_u16()),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[test]
    fn test_block_numbers_wrap_around() {
        // 65536 full blocks plus a short one: block numbers run 1..=65535, 0, 1
        let len = 8 * 65536 + 3;
        let source = Box::new(io::repeat(0xAB).take(len as u64));
        let (mut session, first) = Session::begin(CLIENT, source, &with_blksize(8), 5);
        assert!(matches!(first, Step::Send(Packet::OptionAck { .. })));

        let mut expected: u16 = 1;
        let mut step = session.handle(ack(0));
        while step != Step::Complete {
            let (block, len) = data_of(&step);
            assert_eq!(block, expected);
            if len < 8 {
                assert_eq!(block, 1);
                assert_eq!(len, 3);
            }
            expected = expected.wrapping_add(1);
            step = session.handle(ack(block));
        }
        assert_eq!(session.stats().blocks, 65537);
        assert_eq!(session.stats().bytes, len as u64);
    }
}
