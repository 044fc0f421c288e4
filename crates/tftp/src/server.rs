//! TFTP Server Implementation
//!
//! This module contains the dispatcher: it owns the well-known socket, turns read
//! requests into running transfers, and answers everything else that arrives there.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::RegistryError;
use crate::observer::{TracingObserver, TransferInfo, TransferObserver};
use crate::options::negotiate;
use crate::protocol::{Packet, TftpErrorCode, TransferMode};
use crate::registry::SessionRegistry;
use crate::resolver::{FileResolver, ResolveRequest, RootDirResolver};
use crate::session::{Session, Step};
use crate::transfer::{Transfer, TransferConfig, create_ephemeral_socket, open_source};

const MAX_SESSIONS: usize = 64;

/// Largest request accepted on the well-known port. Longer datagrams are dropped
/// rather than decoded from a truncated prefix.
pub const MAX_REQUEST_LEN: usize = 2047;

/// TFTP Server configuration
#[derive(Debug, Clone)]
pub struct TftpServerConfig {
    pub bind_address: String,
    /// Concurrent transfers; requests beyond this get a "Server busy" error
    pub max_sessions: usize,
    pub transfer_config: TransferConfig,
}

impl Default for TftpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6969".to_string(),
            max_sessions: MAX_SESSIONS,
            transfer_config: TransferConfig::default(),
        }
    }
}

impl TftpServerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_sessions > 0, "max_sessions must be at least 1");
        self.transfer_config.validate()
    }
}

/// Main TFTP server
pub struct TftpServer {
    config: Arc<TftpServerConfig>,
    resolver: Arc<dyn FileResolver>,
    observer: Arc<dyn TransferObserver>,
    registry: SessionRegistry,
    socket: Option<UdpSocket>,
}

impl TftpServer {
    /// Create a new TFTP server serving content from `resolver`
    pub fn new(config: TftpServerConfig, resolver: impl FileResolver + 'static) -> Self {
        let registry = SessionRegistry::new(config.max_sessions);
        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            observer: Arc::new(TracingObserver),
            registry,
            socket: None,
        }
    }

    /// Create a new TFTP server serving a root directory with default settings
    pub fn with_root(bind_address: String, root_directory: PathBuf) -> Self {
        let config = TftpServerConfig {
            bind_address,
            ..Default::default()
        };
        Self::new(config, RootDirResolver::new(root_directory))
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: impl TransferObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Get the server's configuration
    pub fn config(&self) -> &TftpServerConfig {
        &self.config
    }

    /// Active transfers
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Get the local address the server is bound to (if bound)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Validate the configuration and bind the well-known socket
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        self.config.validate().context("Invalid TFTP server configuration")?;

        let addr = tokio::net::lookup_host(&self.config.bind_address)
            .await
            .with_context(|| format!("Invalid bind address {}", self.config.bind_address))?
            .next()
            .with_context(|| format!("Bind address {} resolved to nothing", self.config.bind_address))?;

        let socket = bind_well_known_socket(addr).context("Failed to bind TFTP server socket")?;
        let local_addr = socket.local_addr().context("Failed to get local address")?;
        tracing::info!("TFTP server listening on {}", local_addr);

        self.socket = Some(socket);
        Ok(local_addr)
    }

    /// Start the TFTP server and run until the task is dropped
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then abort every active transfer and wait
    /// for all of them to release their resources.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        if self.socket.is_none() {
            self.bind().await?;
        }
        let socket = self.socket.as_ref().context("Server must be bound before serving")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut transfers = JoinSet::new();
        let mut buffer = vec![0u8; MAX_REQUEST_LEN + 1];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(joined) = transfers.join_next(), if !transfers.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Transfer task failed: {}", e);
                    }
                }
                received = socket.recv_from(&mut buffer) => {
                    let (len, client) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            tracing::warn!("Receive on server socket failed: {}", e);
                            continue;
                        }
                    };
                    if len > MAX_REQUEST_LEN {
                        tracing::debug!("Dropping oversized request from {}", client);
                        continue;
                    }
                    tracing::debug!("Received packet from {}", client);

                    if let Some((transfer, first)) = self.dispatch(&buffer[..len], client).await {
                        transfers.spawn(transfer.run(first, shutdown_rx.clone()));
                    }
                }
            }
        }

        tracing::info!("TFTP server shutting down, aborting {} transfers", transfers.len());
        shutdown_tx.send_replace(true);
        while let Some(joined) = transfers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Transfer task failed: {}", e);
            }
        }

        Ok(())
    }

    /// Handle one datagram received on the well-known port
    async fn dispatch(&self, datagram: &[u8], client: SocketAddr) -> Option<(Transfer, Step)> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!("Dropping malformed packet from {}: {}", client, e);
                return None;
            }
        };

        match packet {
            Packet::ReadRequest {
                filename,
                mode,
                options,
            } => self.accept_read_request(client, filename, mode, options).await,
            Packet::WriteRequest { filename, .. } => {
                tracing::info!("Rejecting WRQ for '{}' from {}", filename, client);
                self.reply_error(client, Packet::error(TftpErrorCode::IllegalOperation, "write not supported"))
                    .await;
                None
            }
            Packet::Error { code, message } => {
                tracing::debug!("Ignoring ERROR {} ({}) from {}", code, message, client);
                None
            }
            other => {
                tracing::debug!("Unexpected {} from {} on the request port", other.opcode(), client);
                self.reply_error(client, Packet::error_with_default_message(TftpErrorCode::UnknownTransferId))
                    .await;
                None
            }
        }
    }

    /// Turn an RRQ into a ready-to-run transfer, or answer it with an error
    async fn accept_read_request(
        &self,
        client: SocketAddr,
        filename: String,
        mode: String,
        options: Vec<(String, String)>,
    ) -> Option<(Transfer, Step)> {
        tracing::info!(
            "RRQ for '{}' in {} mode from {} (options: {:?})",
            filename,
            mode,
            client,
            options
        );

        let Some(transfer_mode) = TransferMode::from_str_opt(&mode).filter(|m| m.is_supported()) else {
            let message = format!("Transfer mode '{}' not supported", mode);
            self.reply_error(client, Packet::error(TftpErrorCode::IllegalOperation, message))
                .await;
            return None;
        };

        if let Some(active) = self.registry.get(&client) {
            tracing::debug!(
                "Ignoring duplicate RRQ from {} (already sending '{}')",
                client,
                active.filename
            );
            return None;
        }
        if self.registry.is_full() {
            tracing::warn!("Refusing RRQ from {}: {} transfers active", client, self.registry.len());
            self.reply_error(client, Packet::error(TftpErrorCode::NotDefined, "Server busy"))
                .await;
            return None;
        }

        let request = ResolveRequest {
            filename: &filename,
            client,
        };
        let resolved = match self.resolver.resolve(&request) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::info!("Cannot serve '{}' to {}: {}", filename, client, e);
                self.reply_error(client, e.to_packet()).await;
                return None;
            }
        };

        let transfer_config = &self.config.transfer_config;
        let negotiated = negotiate(&options, transfer_config, resolved.size);
        if let Some(tsize) = negotiated.transfer_size() {
            tracing::debug!("Reporting tsize {} for '{}' to {}", tsize, filename, client);
        }

        let socket = match create_ephemeral_socket(client, transfer_config.local_bind).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!("Cannot open transfer socket for {}: {:#}", client, e);
                self.reply_error(client, Packet::error(TftpErrorCode::NotDefined, "Cannot open transfer socket"))
                    .await;
                return None;
            }
        };
        let local = match socket.local_addr() {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!("Transfer socket for {} has no local address: {}", client, e);
                return None;
            }
        };

        let info = TransferInfo {
            client,
            local,
            filename,
            mode: transfer_mode,
            file_size: resolved.size,
            block_size: negotiated.block_size,
        };
        let registration = match self.registry.register(info.clone()) {
            Ok(registration) => registration,
            Err(RegistryError::AlreadyActive) => return None,
            Err(e @ RegistryError::AtCapacity(_)) => {
                tracing::warn!("Refusing RRQ from {}: {}", client, e);
                self.reply_error(client, Packet::error(TftpErrorCode::NotDefined, "Server busy"))
                    .await;
                return None;
            }
        };

        let source = open_source(resolved, transfer_mode);
        let (session, first) = Session::begin(client, source, &negotiated, transfer_config.max_retries);

        let transfer = Transfer {
            socket,
            session,
            info,
            timeout: negotiated.timeout,
            registration,
            observer: Arc::clone(&self.observer),
        };
        Some((transfer, first))
    }

    /// Send a one-off error from a transient socket
    async fn reply_error(&self, client: SocketAddr, packet: Packet) {
        let result = async {
            let sock = create_ephemeral_socket(client, self.config.transfer_config.local_bind).await?;
            sock.send_to(&packet.encode(), client).await?;
            anyhow::Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to send {} to {}: {:#}", packet, client, e);
        }
    }
}

/// Bind the request socket; IPv6 addresses also accept IPv4-mapped clients
fn bind_well_known_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .context("Failed to create server socket")?;

    if addr.is_ipv6() {
        socket
            .set_only_v6(false)
            .context("Failed to enable dual-stack on server socket")?;
    }
    socket
        .set_nonblocking(true)
        .context("Failed to set server socket to non-blocking mode")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("Failed to bind server socket to {}", addr))?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).context("Failed to convert server socket to Tokio")
}

/// Run a TFTP server with the given bind address and root directory
///
/// This is a convenience function that creates and runs a TFTP server.
pub async fn run_tftp_server(bind_address: String, root_directory: PathBuf, local_bind: Option<IpAddr>) -> Result<()> {
    let config = TftpServerConfig {
        bind_address,
        transfer_config: TransferConfig {
            local_bind,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut server = TftpServer::new(config, RootDirResolver::new(root_directory));
    server.run().await
}
