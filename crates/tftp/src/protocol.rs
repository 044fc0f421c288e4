//! TFTP Protocol Implementation
//!
//! This module contains the wire-level half of the engine: opcodes, error codes,
//! transfer modes and the [`Packet`] codec.
//!
//! # Packet layouts
//!
//! Every packet starts with a 2-byte big-endian opcode. Text fields are
//! NUL-terminated byte strings.
//!
//! ```text
//! RRQ/WRQ | 01/02 | filename | 0 | mode | 0 | opt1 | 0 | value1 | 0 | ...
//! DATA    | 03    | block#   | payload (0..=blksize bytes)
//! ACK     | 04    | block#   |
//! ERROR   | 05    | code     | message | 0 |
//! OACK    | 06    | opt1 | 0 | value1 | 0 | ...
//! ```
//!
//! Decoding is strict about structure (terminators, minimum lengths, UTF-8) so that
//! garbage can be dropped without a reply. It is lenient about trailing zero padding,
//! which some boot ROMs append to their requests.

use std::fmt;
use std::str::FromStr;

use crate::error::PacketError;

/// Size of the opcode + block number header in front of every DATA payload.
pub const DATA_HEADER_LEN: usize = 4;

/// Packet type carried in the first two bytes of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpOpcode {
    /// RRQ: filename, mode and optional extension options.
    ReadRequest = 1,
    /// WRQ: same layout as RRQ. This server is read-only and refuses it.
    WriteRequest = 2,
    /// DATA: one block of file content. A short payload ends the transfer.
    Data = 3,
    /// ACK: confirms a DATA block, or an OACK when the block number is 0.
    Acknowledgment = 4,
    /// ERROR: terminates the transfer and is never answered.
    Error = 5,
    /// OACK: the options the server accepted (RFC 2347).
    OptionAck = 6,
}

impl TftpOpcode {
    /// Opcode for a wire value, `None` outside 1..=6
    ///
    /// # Examples
    /// ```
    /// use tftp::TftpOpcode;
    ///
    /// assert_eq!(TftpOpcode::from_u16(1), Some(TftpOpcode::ReadRequest));
    /// assert_eq!(TftpOpcode::from_u16(99), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ReadRequest),
            2 => Some(Self::WriteRequest),
            3 => Some(Self::Data),
            4 => Some(Self::Acknowledgment),
            5 => Some(Self::Error),
            6 => Some(Self::OptionAck),
            _ => None,
        }
    }

    /// Convert the opcode to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Short name used in logs
    ///
    /// # Examples
    /// ```
    /// use tftp::TftpOpcode;
    ///
    /// assert_eq!(TftpOpcode::ReadRequest.name(), "RRQ");
    /// assert_eq!(TftpOpcode::OptionAck.name(), "OACK");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadRequest => "RRQ",
            Self::WriteRequest => "WRQ",
            Self::Data => "DATA",
            Self::Acknowledgment => "ACK",
            Self::Error => "ERROR",
            Self::OptionAck => "OACK",
        }
    }
}

impl fmt::Display for TftpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error codes carried in ERROR packets (RFC 1350, code 8 from RFC 2347).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpErrorCode {
    /// Anything without a code of its own; the message says what happened
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    /// The sender is not the peer of the transfer it addressed
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
    OptionNegotiationFailed = 8,
}

impl TftpErrorCode {
    /// Error code for a wire value, `None` outside 0..=8
    ///
    /// # Examples
    /// ```
    /// use tftp::TftpErrorCode;
    ///
    /// assert_eq!(TftpErrorCode::from_u16(1), Some(TftpErrorCode::FileNotFound));
    /// assert_eq!(TftpErrorCode::from_u16(99), None);
    /// ```
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileAlreadyExists),
            7 => Some(Self::NoSuchUser),
            8 => Some(Self::OptionNegotiationFailed),
            _ => None,
        }
    }

    /// Convert the error code to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the default error message for this error code
    ///
    /// # Examples
    /// ```
    /// use tftp::TftpErrorCode;
    ///
    /// assert_eq!(TftpErrorCode::FileNotFound.default_message(), "File not found");
    /// assert_eq!(TftpErrorCode::UnknownTransferId.default_message(), "Unknown transfer ID");
    /// ```
    pub fn default_message(self) -> &'static str {
        match self {
            Self::NotDefined => "Undefined error",
            Self::FileNotFound => "File not found",
            Self::AccessViolation => "Access violation",
            Self::DiskFull => "Disk full or allocation exceeded",
            Self::IllegalOperation => "Illegal TFTP operation",
            Self::UnknownTransferId => "Unknown transfer ID",
            Self::FileAlreadyExists => "File already exists",
            Self::NoSuchUser => "No such user",
            Self::OptionNegotiationFailed => "Option negotiation failed",
        }
    }
}

impl fmt::Display for TftpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_u16())
    }
}

/// TFTP Transfer Modes
///
/// The mode field of a request is matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// Binary mode: bytes go on the wire unchanged.
    Octet,

    /// Text mode: line endings are translated to NETASCII (CR LF) on the way out.
    NetAscii,

    /// Obsolete mail mode from RFC 1350. Recognised so it can be refused by name.
    Mail,
}

impl TransferMode {
    /// Parse a transfer mode from a string
    ///
    /// # Examples
    /// ```
    /// use tftp::TransferMode;
    ///
    /// assert_eq!("octet".parse::<TransferMode>(), Ok(TransferMode::Octet));
    /// assert_eq!("NETASCII".parse::<TransferMode>(), Ok(TransferMode::NetAscii));
    /// assert!("binary".parse::<TransferMode>().is_err());
    /// ```
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "octet" => Some(Self::Octet),
            "netascii" => Some(Self::NetAscii),
            "mail" => Some(Self::Mail),
            _ => None,
        }
    }

    /// Get the string representation of the transfer mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Octet => "octet",
            Self::NetAscii => "netascii",
            Self::Mail => "mail",
        }
    }

    /// Check if this transfer mode can be served
    ///
    /// # Examples
    /// ```
    /// use tftp::TransferMode;
    ///
    /// assert!(TransferMode::Octet.is_supported());
    /// assert!(TransferMode::NetAscii.is_supported());
    /// assert!(!TransferMode::Mail.is_supported());
    /// ```
    pub fn is_supported(self) -> bool {
        match self {
            Self::Octet | Self::NetAscii => true,
            Self::Mail => false,
        }
    }
}

impl FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_opt(s).ok_or_else(|| format!("Unsupported transfer mode: {}", s))
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded TFTP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ReadRequest {
        filename: String,
        mode: String,
        options: Vec<(String, String)>,
    },
    WriteRequest {
        filename: String,
        mode: String,
        options: Vec<(String, String)>,
    },
    Data {
        block: u16,
        payload: Vec<u8>,
    },
    Acknowledge {
        block: u16,
    },
    Error {
        code: u16,
        message: String,
    },
    OptionAck {
        options: Vec<(String, String)>,
    },
}

impl Packet {
    /// Build an ERROR packet with a custom message
    ///
    /// # Examples
    /// ```
    /// use tftp::{Packet, TftpErrorCode};
    ///
    /// let packet = Packet::error(TftpErrorCode::IllegalOperation, "write not supported");
    /// assert_eq!(packet.encode()[..4], [0, 5, 0, 4]);
    /// ```
    pub fn error(code: TftpErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.as_u16(),
            message: message.into(),
        }
    }

    /// Build an ERROR packet carrying the default message for `code`
    pub fn error_with_default_message(code: TftpErrorCode) -> Self {
        Self::error(code, code.default_message())
    }

    /// The opcode this packet is encoded with
    pub fn opcode(&self) -> TftpOpcode {
        match self {
            Self::ReadRequest { .. } => TftpOpcode::ReadRequest,
            Self::WriteRequest { .. } => TftpOpcode::WriteRequest,
            Self::Data { .. } => TftpOpcode::Data,
            Self::Acknowledge { .. } => TftpOpcode::Acknowledgment,
            Self::Error { .. } => TftpOpcode::Error,
            Self::OptionAck { .. } => TftpOpcode::OptionAck,
        }
    }

    /// Decode a datagram
    ///
    /// # Examples
    /// ```
    /// use tftp::Packet;
    ///
    /// let packet = Packet::decode(&[0, 4, 0, 7]).unwrap();
    /// assert_eq!(packet, Packet::Acknowledge { block: 7 });
    /// assert!(Packet::decode(&[0, 9, 0, 0]).is_err());
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let raw = get_opcode(buf).ok_or(PacketError::TooShort {
            expected: 2,
            actual: buf.len(),
        })?;
        let opcode = TftpOpcode::from_u16(raw).ok_or(PacketError::UnknownOpcode(raw))?;
        let body = &buf[2..];

        match opcode {
            TftpOpcode::ReadRequest | TftpOpcode::WriteRequest => {
                let mut fields = Fields::new(body);
                let filename = fields.required("filename")?;
                let mode = fields.required("mode")?;
                let options = fields.pairs()?;

                Ok(if opcode == TftpOpcode::ReadRequest {
                    Self::ReadRequest {
                        filename,
                        mode,
                        options,
                    }
                } else {
                    Self::WriteRequest {
                        filename,
                        mode,
                        options,
                    }
                })
            }
            TftpOpcode::Data => {
                let block = read_u16(buf, opcode)?;
                Ok(Self::Data {
                    block,
                    payload: buf[DATA_HEADER_LEN..].to_vec(),
                })
            }
            TftpOpcode::Acknowledgment => Ok(Self::Acknowledge {
                block: read_u16(buf, opcode)?,
            }),
            TftpOpcode::Error => {
                let code = read_u16(buf, opcode)?;
                let message = Fields::new(&buf[4..]).required("error message")?;
                Ok(Self::Error { code, message })
            }
            TftpOpcode::OptionAck => Ok(Self::OptionAck {
                options: Fields::new(body).pairs()?,
            }),
        }
    }

    /// Encode the packet into a freshly allocated datagram
    pub fn encode(&self) -> Vec<u8> {
        let opcode = self.opcode().as_u16().to_be_bytes();

        match self {
            Self::ReadRequest {
                filename,
                mode,
                options,
            }
            | Self::WriteRequest {
                filename,
                mode,
                options,
            } => {
                let mut v = Vec::with_capacity(2 + filename.len() + mode.len() + 2 + pairs_len(options));
                v.extend_from_slice(&opcode);
                push_str(&mut v, filename);
                push_str(&mut v, mode);
                push_pairs(&mut v, options);
                v
            }
            Self::Data { block, payload } => {
                let mut v = Vec::with_capacity(DATA_HEADER_LEN + payload.len());
                v.extend_from_slice(&opcode);
                v.extend_from_slice(&block.to_be_bytes());
                v.extend_from_slice(payload);
                v
            }
            Self::Acknowledge { block } => {
                let mut v = Vec::with_capacity(4);
                v.extend_from_slice(&opcode);
                v.extend_from_slice(&block.to_be_bytes());
                v
            }
            Self::Error { code, message } => {
                let mut v = Vec::with_capacity(4 + message.len() + 1);
                v.extend_from_slice(&opcode);
                v.extend_from_slice(&code.to_be_bytes());
                push_str(&mut v, message);
                v
            }
            Self::OptionAck { options } => {
                let mut v = Vec::with_capacity(2 + pairs_len(options));
                v.extend_from_slice(&opcode);
                push_pairs(&mut v, options);
                v
            }
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadRequest { filename, mode, .. } | Self::WriteRequest { filename, mode, .. } => {
                write!(f, "{} '{}' ({})", self.opcode(), filename, mode)
            }
            Self::Data { block, payload } => write!(f, "DATA #{} ({} bytes)", block, payload.len()),
            Self::Acknowledge { block } => write!(f, "ACK #{}", block),
            Self::Error { code, message } => write!(f, "ERROR {}: {}", code, message),
            Self::OptionAck { options } => write!(f, "OACK {:?}", options),
        }
    }
}

/// Find the next null byte in a buffer starting from a given position
pub fn find_zero(buf: &[u8], start: usize) -> Option<usize> {
    buf[start..].iter().position(|&b| b == 0).map(|pos| start + pos)
}

/// Get the raw opcode from a packet buffer
pub fn get_opcode(buf: &[u8]) -> Option<u16> {
    if buf.len() >= 2 {
        Some(u16::from_be_bytes([buf[0], buf[1]]))
    } else {
        None
    }
}

/// Get the TFTP opcode enum from a packet buffer
pub fn get_tftp_opcode(buf: &[u8]) -> Option<TftpOpcode> {
    get_opcode(buf).and_then(TftpOpcode::from_u16)
}

fn read_u16(buf: &[u8], opcode: TftpOpcode) -> Result<u16, PacketError> {
    if buf.len() < 4 {
        return Err(PacketError::Truncated {
            opcode,
            actual: buf.len(),
        });
    }
    Ok(u16::from_be_bytes([buf[2], buf[3]]))
}

fn push_str(v: &mut Vec<u8>, s: &str) {
    v.extend_from_slice(s.as_bytes());
    v.push(0);
}

fn push_pairs(v: &mut Vec<u8>, pairs: &[(String, String)]) {
    for (name, value) in pairs {
        push_str(v, name);
        push_str(v, value);
    }
}

fn pairs_len(pairs: &[(String, String)]) -> usize {
    pairs.iter().map(|(n, v)| n.len() + v.len() + 2).sum()
}

/// Cursor over the NUL-terminated text fields of a packet body.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_exhausted(&self) -> bool {
        self.buf[self.pos..].iter().all(|&b| b == 0)
    }

    fn required(&mut self, field: &'static str) -> Result<String, PacketError> {
        if self.pos >= self.buf.len() {
            return Err(PacketError::MissingField(field));
        }
        let end = find_zero(self.buf, self.pos).ok_or(PacketError::Unterminated(field))?;
        let text = std::str::from_utf8(&self.buf[self.pos..end]).map_err(|_| PacketError::InvalidText(field))?;
        self.pos = end + 1;
        Ok(text.to_string())
    }

    fn pairs(&mut self) -> Result<Vec<(String, String)>, PacketError> {
        let mut pairs = Vec::new();
        // Trailing zero bytes are padding, not an empty option name.
        while !self.is_exhausted() {
            let name = self.required("option name")?;
            let value = self.required("option value")?;
            pairs.push((name, value));
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rrq_bytes(parts: &[&[u8]]) -> Vec<u8> {
        let mut buf = TftpOpcode::ReadRequest.as_u16().to_be_bytes().to_vec();
        for part in parts {
            buf.extend_from_slice(part);
        }
        buf
    }

    #[test]
    fn test_tftp_opcode_conversion() {
        assert_eq!(TftpOpcode::ReadRequest.as_u16(), 1);
        assert_eq!(TftpOpcode::OptionAck.as_u16(), 6);
        assert_eq!(TftpOpcode::from_u16(3), Some(TftpOpcode::Data));
        assert_eq!(TftpOpcode::from_u16(0), None);
        assert_eq!(TftpOpcode::from_u16(7), None);
    }

    #[test]
    fn test_tftp_error_code_conversion() {
        for code in 0..=8u16 {
            assert_eq!(TftpErrorCode::from_u16(code).map(TftpErrorCode::as_u16), Some(code));
        }
        assert_eq!(TftpErrorCode::from_u16(9), None);
        assert_eq!(TftpErrorCode::OptionNegotiationFailed.as_u16(), 8);
    }

    #[test]
    fn test_transfer_mode() {
        assert_eq!(TransferMode::from_str_opt("OcTeT"), Some(TransferMode::Octet));
        assert_eq!(TransferMode::from_str_opt("mail"), Some(TransferMode::Mail));
        assert_eq!(TransferMode::from_str_opt(""), None);
        assert!(!TransferMode::Mail.is_supported());
    }

    #[test]
    fn test_find_zero() {
        let buf = b"hello\0world\0";
        assert_eq!(find_zero(buf, 0), Some(5));
        assert_eq!(find_zero(buf, 6), Some(11));
        assert_eq!(find_zero(buf, 12), None);
    }

    #[test]
    fn test_decode_rrq_basic() {
        let packet = Packet::decode(&rrq_bytes(&[b"test.txt\0", b"octet\0"])).unwrap();
        assert_eq!(
            packet,
            Packet::ReadRequest {
                filename: "test.txt".into(),
                mode: "octet".into(),
                options: vec![],
            }
        );
    }

    #[test]
    fn test_decode_rrq_keeps_option_order() {
        let buf = rrq_bytes(&[b"boot.img\0", b"octet\0", b"tsize\0", b"0\0", b"BLKSIZE\0", b"1400\0"]);
        let Packet::ReadRequest { options, .. } = Packet::decode(&buf).unwrap() else {
            panic!("expected RRQ");
        };
        assert_eq!(
            options,
            vec![
                ("tsize".to_string(), "0".to_string()),
                ("BLKSIZE".to_string(), "1400".to_string())
            ]
        );
    }

    #[test]
    fn test_decode_rrq_tolerates_zero_padding() {
        let buf = rrq_bytes(&[b"pxelinux.0\0", b"octet\0", b"\0\0\0"]);
        let Packet::ReadRequest { options, .. } = Packet::decode(&buf).unwrap() else {
            panic!("expected RRQ");
        };
        assert!(options.is_empty());
    }

    #[test]
    fn test_decode_wrq() {
        let mut buf = TftpOpcode::WriteRequest.as_u16().to_be_bytes().to_vec();
        buf.extend_from_slice(b"upload.bin\0netascii\0");
        assert!(matches!(
            Packet::decode(&buf),
            Ok(Packet::WriteRequest { filename, .. }) if filename == "upload.bin"
        ));
    }

    #[test]
    fn test_decode_malformed_requests() {
        // unterminated filename
        assert!(matches!(
            Packet::decode(&rrq_bytes(&[b"file"])),
            Err(PacketError::Unterminated("filename"))
        ));
        // missing mode
        assert!(matches!(
            Packet::decode(&rrq_bytes(&[b"file\0"])),
            Err(PacketError::MissingField("mode"))
        ));
        // option without value
        assert!(matches!(
            Packet::decode(&rrq_bytes(&[b"file\0", b"octet\0", b"blksize\0"])),
            Err(PacketError::MissingField("option value"))
        ));
        // unterminated option value
        assert!(matches!(
            Packet::decode(&rrq_bytes(&[b"file\0", b"octet\0", b"blksize\0", b"1024"])),
            Err(PacketError::Unterminated("option value"))
        ));
        // invalid utf-8
        assert!(matches!(
            Packet::decode(&rrq_bytes(&[b"\xff\xfe\0", b"octet\0"])),
            Err(PacketError::InvalidText("filename"))
        ));
    }

    #[test]
    fn test_decode_short_and_unknown() {
        assert!(matches!(
            Packet::decode(&[]),
            Err(PacketError::TooShort { expected: 2, actual: 0 })
        ));
        assert!(matches!(Packet::decode(&[0]), Err(PacketError::TooShort { .. })));
        assert!(matches!(Packet::decode(&[0, 7, 0, 1]), Err(PacketError::UnknownOpcode(7))));
        assert!(matches!(
            Packet::decode(&[0, 4, 0]),
            Err(PacketError::Truncated {
                opcode: TftpOpcode::Acknowledgment,
                actual: 3
            })
        ));
        assert!(matches!(Packet::decode(&[0, 3, 0]), Err(PacketError::Truncated { .. })));
    }

    #[test]
    fn test_decode_data() {
        let packet = Packet::decode(&[0, 3, 0x12, 0x34, 1, 2, 3]).unwrap();
        assert_eq!(
            packet,
            Packet::Data {
                block: 0x1234,
                payload: vec![1, 2, 3]
            }
        );

        let empty = Packet::decode(&[0, 3, 0, 9]).unwrap();
        assert_eq!(
            empty,
            Packet::Data {
                block: 9,
                payload: vec![]
            }
        );
    }

    #[test]
    fn test_decode_error() {
        let mut buf = vec![0, 5, 0, 2];
        buf.extend_from_slice(b"Access denied\0");
        assert_eq!(
            Packet::decode(&buf).unwrap(),
            Packet::Error {
                code: 2,
                message: "Access denied".into()
            }
        );

        // message must be terminated
        assert!(matches!(
            Packet::decode(&[0, 5, 0, 1, b'x']),
            Err(PacketError::Unterminated("error message"))
        ));
        assert!(matches!(
            Packet::decode(&[0, 5, 0, 1]),
            Err(PacketError::MissingField("error message"))
        ));
    }

    #[test]
    fn test_encode_data() {
        let packet = Packet::Data {
            block: 1,
            payload: b"Hello, TFTP!".to_vec(),
        }
        .encode();

        assert_eq!(packet.len(), DATA_HEADER_LEN + 12);
        assert_eq!(get_tftp_opcode(&packet), Some(TftpOpcode::Data));
        assert_eq!(&packet[2..4], &[0, 1]);
        assert_eq!(&packet[4..], b"Hello, TFTP!");
    }

    #[test]
    fn test_encode_error() {
        let packet = Packet::error_with_default_message(TftpErrorCode::FileNotFound).encode();
        assert_eq!(&packet[..4], &[0, 5, 0, 1]);
        assert_eq!(&packet[4..], b"File not found\0");
    }

    #[test]
    fn test_encode_oack_in_order() {
        let packet = Packet::OptionAck {
            options: vec![
                ("blksize".to_string(), "1400".to_string()),
                ("tsize".to_string(), "1024".to_string()),
            ],
        }
        .encode();
        assert_eq!(&packet[..2], &[0, 6]);
        assert_eq!(&packet[2..], b"blksize\x001400\x00tsize\x001024\x00");
    }

    #[test]
    fn test_request_encoding_is_decodable() {
        let request = Packet::ReadRequest {
            filename: "grub/grub.cfg".into(),
            mode: "netascii".into(),
            options: vec![("timeout".into(), "2".into())],
        };
        assert_eq!(Packet::decode(&request.encode()).unwrap(), request);
    }

    #[test]
    fn test_get_opcode() {
        assert_eq!(get_opcode(&[0, 4, 0, 1]), Some(4));
        assert_eq!(get_tftp_opcode(&[0, 6]), Some(TftpOpcode::OptionAck));
        assert_eq!(get_opcode(&[]), None);
        assert_eq!(get_opcode(&[1]), None);
    }
}
