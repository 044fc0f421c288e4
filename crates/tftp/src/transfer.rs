//! TFTP File Transfer Logic
//!
//! This module runs one accepted transfer: it owns the per-transfer socket, feeds
//! datagrams and retransmission timeouts into the [`Session`] state machine, and
//! carries out the steps it returns.

use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};

use crate::netascii::NetasciiReader;
use crate::observer::{TransferInfo, TransferObserver};
use crate::options::{MAX_BLOCK_SIZE, MAX_TIMEOUT_SECS, MIN_BLOCK_SIZE, MIN_TIMEOUT_SECS};
use crate::protocol::{Packet, TftpErrorCode, TftpOpcode, TransferMode, get_tftp_opcode};
use crate::registry::Registration;
use crate::resolver::ResolvedFile;
use crate::session::{AbortReason, Event, Session, Step, TransferStats};

const TIMEOUT_SECS: u64 = 3;
const MAX_RETRIES: u32 = 5;
const MAX_NEGOTIATED_BLOCK_SIZE: u16 = 1400;

/// Clients only send ACK and ERROR packets on a transfer endpoint.
const RECV_BUFFER_SIZE: usize = 2048;

/// Transfer session configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Largest block size granted to a `blksize` request
    pub max_block_size: u16,
    /// Retransmission timeout when the client does not negotiate one
    pub default_timeout: Duration,
    /// Negotiable `timeout` range, in seconds
    pub min_timeout: u8,
    pub max_timeout: u8,
    /// Retransmissions of one packet before the client is presumed gone
    pub max_retries: u32,
    /// Local address for per-transfer sockets
    pub local_bind: Option<IpAddr>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_block_size: MAX_NEGOTIATED_BLOCK_SIZE,
            default_timeout: Duration::from_secs(TIMEOUT_SECS),
            min_timeout: MIN_TIMEOUT_SECS,
            max_timeout: MAX_TIMEOUT_SECS,
            max_retries: MAX_RETRIES,
            local_bind: None,
        }
    }
}

impl TransferConfig {
    /// Negotiable timeout range, forced into the RFC 2349 range
    pub fn timeout_bounds(&self) -> (u8, u8) {
        let min = self.min_timeout.max(MIN_TIMEOUT_SECS);
        let max = self.max_timeout.max(min);
        (min, max)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.max_block_size),
            "maximum block size {} outside {}..={}",
            self.max_block_size,
            MIN_BLOCK_SIZE,
            MAX_BLOCK_SIZE
        );
        ensure!(!self.default_timeout.is_zero(), "default timeout must be positive");
        ensure!(
            self.min_timeout >= MIN_TIMEOUT_SECS && self.min_timeout <= self.max_timeout,
            "invalid timeout range {}..={}",
            self.min_timeout,
            self.max_timeout
        );
        Ok(())
    }
}

/// Wrap a resolved file into the byte stream that goes on the wire.
///
/// Never yields more than the resolver-reported size of raw file bytes.
pub fn open_source(resolved: ResolvedFile, mode: TransferMode) -> Box<dyn Read + Send> {
    let limited = resolved.reader.take(resolved.size);
    match mode {
        TransferMode::NetAscii => Box::new(NetasciiReader::new(limited)),
        TransferMode::Octet | TransferMode::Mail => Box::new(limited),
    }
}

/// Create an ephemeral UDP socket appropriate for the client address family
pub async fn create_ephemeral_socket(client: SocketAddr, local_bind: Option<IpAddr>) -> Result<UdpSocket> {
    let ip = local_bind.unwrap_or(match client {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    });

    let sock = UdpSocket::bind(SocketAddr::new(ip, 0))
        .await
        .context("failed to bind ephemeral socket")?;

    tracing::debug!("Transfer socket for {} bound to {}", client, sock.local_addr()?);
    Ok(sock)
}

/// Everything one running transfer owns.
pub struct Transfer {
    pub socket: UdpSocket,
    pub session: Session,
    pub info: TransferInfo,
    pub timeout: Duration,
    pub registration: Registration,
    pub observer: Arc<dyn TransferObserver>,
}

impl Transfer {
    /// Drive the transfer to completion or abort, starting with the step produced
    /// when the session was created.
    pub async fn run(self, first: Step, mut shutdown: watch::Receiver<bool>) -> Result<TransferStats, AbortReason> {
        let Transfer {
            socket,
            mut session,
            info,
            timeout,
            registration,
            observer,
        } = self;
        let client = info.client;

        observer.transfer_started(&info);
        tracing::debug!(
            "Transfer for {} running with blksize {} and timeout {:?}",
            client,
            session.block_size(),
            timeout
        );

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut deadline = Instant::now() + timeout;
        let mut step = first;

        let outcome = loop {
            match step {
                Step::Send(packet) | Step::Retransmit(packet) => {
                    tracing::trace!("Sending {} to {}", packet, client);
                    if let Err(e) = socket.send_to(&packet.encode(), client).await {
                        step = session.abort(AbortReason::Socket(e.to_string()), None);
                        continue;
                    }
                    deadline = Instant::now() + timeout;
                }
                Step::Ignore => {}
                Step::Complete => break Ok(session.stats()),
                Step::Abort { reason, reply } => {
                    if let Some(reply) = reply
                        && let Err(e) = socket.send_to(&reply.encode(), client).await
                    {
                        tracing::debug!("Failed to send {} to {}: {}", reply, client, e);
                    }
                    break Err(reason);
                }
            }

            step = tokio::select! {
                biased;
                _ = shutdown.changed() => session.handle(Event::Shutdown),
                received = timeout_at(deadline, socket.recv_from(&mut buf)) => match received {
                    Err(_elapsed) => {
                        tracing::debug!(
                            "Timeout waiting for ACK #{} from {} (retry {})",
                            session.expected_ack(),
                            client,
                            session.retries() + 1
                        );
                        session.handle(Event::Timeout)
                    }
                    Ok(Err(e)) => session.abort(AbortReason::Socket(e.to_string()), None),
                    Ok(Ok((len, src))) => on_datagram(&socket, &mut session, &buf[..len], src).await,
                },
            };
        };

        // Endpoint, file and registry entry are released before anyone hears about it.
        let stats = session.stats();
        drop(socket);
        drop(session);
        drop(registration);

        match &outcome {
            Ok(_) => observer.transfer_completed(&info, &stats),
            Err(reason) => observer.transfer_aborted(&info, reason, &stats),
        }
        outcome
    }
}

/// Route one datagram received on the transfer socket.
async fn on_datagram(socket: &UdpSocket, session: &mut Session, datagram: &[u8], src: SocketAddr) -> Step {
    if src != session.client() {
        tracing::warn!(
            "Packet from unknown transfer ID {} on transfer for {}",
            src,
            session.client()
        );
        // An ERROR is never answered.
        if get_tftp_opcode(datagram) != Some(TftpOpcode::Error)
            && let Err(e) = reply_unknown_transfer_id(socket, src).await
        {
            tracing::debug!("Failed to send unknown-TID error to {}: {:#}", src, e);
        }
        return Step::Ignore;
    }

    match Packet::decode(datagram) {
        Ok(packet) => {
            tracing::trace!("Received {} from {}", packet, src);
            session.handle(Event::Packet(packet))
        }
        Err(e) => {
            tracing::debug!("Dropping malformed packet from {}: {}", src, e);
            Step::Ignore
        }
    }
}

/// Error 5 goes out from a transient socket on the transfer's local address, so the
/// transfer socket only ever talks to its own client.
async fn reply_unknown_transfer_id(socket: &UdpSocket, src: SocketAddr) -> Result<()> {
    let local_ip = socket.local_addr().context("transfer socket has no local address")?.ip();
    let responder = create_ephemeral_socket(src, Some(local_ip)).await?;
    let reply = Packet::error_with_default_message(TftpErrorCode::UnknownTransferId);
    responder
        .send_to(&reply.encode(), src)
        .await
        .context("failed to send unknown-TID error")?;
    Ok(())
}
