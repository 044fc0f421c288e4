//! Error types for the TFTP engine.

use std::io;

use thiserror::Error;

use crate::protocol::{Packet, TftpErrorCode, TftpOpcode};

/// A datagram that could not be decoded. Such datagrams are dropped without a reply.
#[derive(Debug, Error)]
pub enum PacketError {
    /// Datagram too short to hold an opcode
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Opcode outside 1..=6
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u16),

    /// Datagram too short for the fixed fields of its opcode
    #[error("truncated {opcode} packet ({actual} bytes)")]
    Truncated { opcode: TftpOpcode, actual: usize },

    /// A required text field is absent
    #[error("missing {0}")]
    MissingField(&'static str),

    /// A text field runs to the end of the datagram without a NUL
    #[error("{0} not terminated")]
    Unterminated(&'static str),

    /// A text field is not valid UTF-8
    #[error("{0} is not valid UTF-8")]
    InvalidText(&'static str),
}

/// Failure to map a requested filename to readable content.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    /// Wire error code reported to the client
    pub fn error_code(&self) -> TftpErrorCode {
        match self {
            Self::NotFound(_) | Self::Io { .. } => TftpErrorCode::FileNotFound,
            Self::AccessDenied(_) => TftpErrorCode::AccessViolation,
        }
    }

    /// ERROR packet sent in reply to the request that failed to resolve
    pub fn to_packet(&self) -> Packet {
        Packet::error_with_default_message(self.error_code())
    }
}

/// Registration refused by the session registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The client identity already owns an active transfer
    #[error("transfer already active for this client")]
    AlreadyActive,

    /// The configured session cap is reached
    #[error("session limit of {0} reached")]
    AtCapacity(usize),
}
