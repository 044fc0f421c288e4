//! Option negotiation (RFC 2347, 2348, 2349)
//!
//! A read request may carry `blksize`, `timeout` and `tsize` options. The server
//! answers with the subset it accepts, in the order the client asked for them.
//! Anything unrecognised or out of range is silently left out of the answer.

use std::time::Duration;

use crate::transfer::TransferConfig;

/// Protocol default block size (RFC 1350)
pub const DEFAULT_BLOCK_SIZE: u16 = 512;
/// Smallest block size allowed by RFC 2348
pub const MIN_BLOCK_SIZE: u16 = 8;
/// Largest block size allowed by RFC 2348
pub const MAX_BLOCK_SIZE: u16 = 65464;
/// Smallest timeout allowed by RFC 2349, in seconds
pub const MIN_TIMEOUT_SECS: u8 = 1;
/// Largest timeout allowed by RFC 2349, in seconds
pub const MAX_TIMEOUT_SECS: u8 = 255;

/// An option the server accepted, with the value it will echo in the OACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TftpOption {
    BlockSize(u16),
    Timeout(u8),
    TransferSize(u64),
    /// Only a window of one block is ever accepted.
    WindowSize(u16),
}

impl TftpOption {
    pub fn name(self) -> &'static str {
        match self {
            Self::BlockSize(_) => "blksize",
            Self::Timeout(_) => "timeout",
            Self::TransferSize(_) => "tsize",
            Self::WindowSize(_) => "windowsize",
        }
    }

    pub fn value(self) -> String {
        match self {
            Self::BlockSize(v) | Self::WindowSize(v) => v.to_string(),
            Self::Timeout(v) => v.to_string(),
            Self::TransferSize(v) => v.to_string(),
        }
    }
}

/// Outcome of negotiation: the accepted options plus the parameters the
/// transfer will actually run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub accepted: Vec<TftpOption>,
    pub block_size: u16,
    pub timeout: Duration,
}

impl Negotiated {
    /// Whether the transfer opens with an OACK instead of DATA block 1
    pub fn has_options(&self) -> bool {
        !self.accepted.is_empty()
    }

    /// The accepted options as OACK (name, value) pairs
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.accepted
            .iter()
            .map(|opt| (opt.name().to_string(), opt.value()))
            .collect()
    }

    /// The accepted transfer size, if the client asked for one
    pub fn transfer_size(&self) -> Option<u64> {
        self.accepted.iter().find_map(|opt| match opt {
            TftpOption::TransferSize(size) => Some(*size),
            _ => None,
        })
    }
}

/// Compute the accepted option set for a read request.
///
/// `file_size` is the resolver-reported size; it is the only value ever echoed
/// for `tsize`.
///
/// # Examples
/// ```
/// use tftp::{TransferConfig, negotiate};
///
/// let config = TransferConfig { max_block_size: 1024, ..Default::default() };
/// let requested = vec![("blksize".to_string(), "65464".to_string())];
/// let negotiated = negotiate(&requested, &config, 4096);
/// assert_eq!(negotiated.block_size, 1024);
/// assert_eq!(negotiated.to_pairs(), vec![("blksize".to_string(), "1024".to_string())]);
/// ```
pub fn negotiate(requested: &[(String, String)], config: &TransferConfig, file_size: u64) -> Negotiated {
    let max_block_size = config.max_block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
    let (min_timeout, max_timeout) = config.timeout_bounds();

    let mut accepted: Vec<TftpOption> = Vec::new();

    for (name, value) in requested {
        let value = value.trim();
        let option = match name.to_ascii_lowercase().as_str() {
            "blksize" => value
                .parse::<u32>()
                .ok()
                .filter(|n| (u32::from(MIN_BLOCK_SIZE)..=u32::from(MAX_BLOCK_SIZE)).contains(n))
                .map(|n| TftpOption::BlockSize((n as u16).min(max_block_size))),
            "timeout" => value
                .parse::<u64>()
                .ok()
                .map(|n| TftpOption::Timeout(n.clamp(u64::from(min_timeout), u64::from(max_timeout)) as u8)),
            "tsize" => value.parse::<u64>().ok().map(|_| TftpOption::TransferSize(file_size)),
            "windowsize" => value
                .parse::<u16>()
                .ok()
                .filter(|&n| n >= 1)
                .map(|_| TftpOption::WindowSize(1)),
            _ => None,
        };

        let Some(option) = option else {
            tracing::debug!("Ignoring option {}={}", name, value);
            continue;
        };

        // First occurrence of a name wins.
        if accepted.iter().all(|opt| opt.name() != option.name()) {
            accepted.push(option);
        }
    }

    let block_size = accepted
        .iter()
        .find_map(|opt| match opt {
            TftpOption::BlockSize(size) => Some(*size),
            _ => None,
        })
        .unwrap_or(DEFAULT_BLOCK_SIZE);

    let timeout = accepted
        .iter()
        .find_map(|opt| match opt {
            TftpOption::Timeout(secs) => Some(Duration::from_secs(u64::from(*secs))),
            _ => None,
        })
        .unwrap_or(config.default_timeout);

    Negotiated {
        accepted,
        block_size,
        timeout,
    }
}
