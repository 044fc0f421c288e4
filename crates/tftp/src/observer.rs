//! Transfer lifecycle reporting
//!
//! Observers are told when a transfer starts and how it ends. They cannot
//! influence the engine.

use std::net::SocketAddr;

use crate::protocol::TransferMode;
use crate::session::{AbortReason, TransferStats};

/// Description of one accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInfo {
    pub client: SocketAddr,
    /// Per-transfer endpoint serving this client
    pub local: SocketAddr,
    pub filename: String,
    pub mode: TransferMode,
    pub file_size: u64,
    pub block_size: u16,
}

pub trait TransferObserver: Send + Sync {
    fn transfer_started(&self, _info: &TransferInfo) {}

    fn transfer_completed(&self, _info: &TransferInfo, _stats: &TransferStats) {}

    fn transfer_aborted(&self, _info: &TransferInfo, _reason: &AbortReason, _stats: &TransferStats) {}
}

/// Reports lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn transfer_started(&self, info: &TransferInfo) {
        tracing::info!(
            "Sending '{}' ({} bytes, {} mode, blksize {}) to {} from {}",
            info.filename,
            info.file_size,
            info.mode,
            info.block_size,
            info.client,
            info.local
        );
    }

    fn transfer_completed(&self, info: &TransferInfo, stats: &TransferStats) {
        tracing::info!(
            "Successfully transferred '{}' to {} ({} blocks, {} bytes, {} retransmissions)",
            info.filename,
            info.client,
            stats.blocks,
            stats.bytes,
            stats.retransmissions
        );
    }

    fn transfer_aborted(&self, info: &TransferInfo, reason: &AbortReason, stats: &TransferStats) {
        tracing::warn!(
            "Transfer of '{}' to {} aborted after {} blocks: {}",
            info.filename,
            info.client,
            stats.blocks,
            reason
        );
    }
}
