//! TFTP (Trivial File Transfer Protocol) read-only server
//!
//! This crate provides a TFTP server that serves files to clients and never
//! accepts writes. It supports:
//! - Read requests (RRQ) in octet and netascii modes
//! - Option negotiation (RFC 2347): block size (RFC 2348), timeout and transfer
//!   size (RFC 2349), and a window size of 1 (RFC 7440)
//! - Concurrent transfers, each on its own ephemeral socket
//! - Bounded retransmission with a per-transfer timeout
//! - Pluggable file resolution and transfer observation
//!
//! # Organization
//!
//! - [`Packet`] - wire codec for all six TFTP packet kinds
//! - [`negotiate`] - option negotiation against a [`TransferConfig`]
//! - [`Session`] - the per-transfer state machine, free of I/O
//! - [`Transfer`] - drives one session over its socket
//! - [`SessionRegistry`] - active transfers keyed by client endpoint
//! - [`FileResolver`] / [`RootDirResolver`] - filename to content
//! - [`TransferObserver`] / [`TracingObserver`] - lifecycle reporting
//! - [`TftpServer`] - the dispatcher on the well-known port
//!
//! # Basic Server Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use tftp::{TftpServer, run_tftp_server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Simple usage with convenience function
//!     run_tftp_server("0.0.0.0:69".to_string(), PathBuf::from("./tftp_root"), None).await?;
//!
//!     // Or use the server struct for more control
//!     let mut server = TftpServer::with_root("127.0.0.1:6969".to_string(), PathBuf::from("./files"));
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Working with Packets
//!
//! ```rust
//! use tftp::{Packet, TftpErrorCode, TftpOpcode, TransferMode};
//!
//! let rrq = Packet::decode(b"\x00\x01boot.img\x00octet\x00blksize\x001400\x00").unwrap();
//! assert_eq!(rrq.opcode(), TftpOpcode::ReadRequest);
//!
//! let mode: TransferMode = "NetASCII".parse().unwrap();
//! assert!(mode.is_supported());
//!
//! let error = Packet::error_with_default_message(TftpErrorCode::FileNotFound);
//! assert_eq!(error.encode(), b"\x00\x05\x00\x01File not found\x00");
//! ```

mod error;
mod netascii;
mod observer;
mod options;
mod protocol;
mod registry;
mod resolver;
mod server;
mod session;
mod transfer;

pub use error::*;
pub use netascii::*;
pub use observer::*;
pub use options::*;
pub use protocol::*;
pub use registry::*;
pub use resolver::*;
pub use server::*;
pub use session::*;
pub use transfer::*;
