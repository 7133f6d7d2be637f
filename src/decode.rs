//! Field-by-field decoding of inbound IP/ICMP frames.
//!
//! A raw ICMPv4 socket delivers the full IP datagram. Every field is read
//! from the byte buffer with explicit byte-order rules; the host's struct
//! layout is never imposed on wire bytes.

use crate::packet::{ECHO_CODE, ECHO_REPLY_TYPE, ICMP_HEADER_LEN};
use crate::probe::SequenceNumber;
use std::net::Ipv4Addr;
use std::{error::Error, fmt};

pub const IPV4_HEADER_MIN_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Header length in bytes, options included.
    pub header_len: usize,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

/// The 8-byte ICMP echo header.
///
/// Identifier and sequence are exposed in both byte orders because kernels
/// differ on which order these fields are delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub identifier_swapped: u16,
    pub sequence: u16,
    pub sequence_swapped: u16,
}

impl IcmpHeader {
    #[must_use]
    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == ECHO_REPLY_TYPE && self.icmp_code == ECHO_CODE
    }

    #[must_use]
    pub fn matches_identifier(&self, identifier: u16) -> bool {
        self.identifier == identifier || self.identifier_swapped == identifier
    }

    #[must_use]
    pub fn matches_sequence(&self, sequence: SequenceNumber) -> bool {
        self.sequence == sequence.0 || self.sequence_swapped == sequence.0
    }
}

/// Decoded view of one received frame. Transient: created per frame and
/// discarded after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundDatagram {
    pub ip: Ipv4Header,
    pub icmp: IcmpHeader,
    /// Total length of the received frame in bytes.
    pub frame_len: usize,
}

impl InboundDatagram {
    /// Number of echo payload bytes following the ICMP header.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.frame_len - self.ip.header_len - ICMP_HEADER_LEN
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame is too short to contain the named header.
    Truncated { what: &'static str, needed: usize, got: usize },
    /// The IP header declares a length shorter than the minimum.
    BadHeaderLength(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { what, needed, got } => {
                write!(f, "frame truncated: {what} needs {needed} bytes, got {got}")
            }
            DecodeError::BadHeaderLength(len) => {
                write!(f, "bad IP header length: {len} bytes")
            }
        }
    }
}

impl Error for DecodeError {}

/// Decodes a received frame into its IP and ICMP headers.
///
/// IP options are skipped according to the header-length field. A
/// malformed or too-short buffer yields a [`DecodeError`], never a panic.
pub fn decode_datagram(frame: &[u8]) -> Result<InboundDatagram, DecodeError> {
    if frame.len() < IPV4_HEADER_MIN_LEN {
        return Err(DecodeError::Truncated {
            what: "IP header",
            needed: IPV4_HEADER_MIN_LEN,
            got: frame.len(),
        });
    }

    let version = frame[0] >> 4;
    let header_len = usize::from(frame[0] & 0x0F) * 4;
    if header_len < IPV4_HEADER_MIN_LEN {
        return Err(DecodeError::BadHeaderLength(header_len));
    }
    if frame.len() < header_len + ICMP_HEADER_LEN {
        return Err(DecodeError::Truncated {
            what: "ICMP header",
            needed: header_len + ICMP_HEADER_LEN,
            got: frame.len(),
        });
    }

    let ip = Ipv4Header {
        version,
        header_len,
        ttl: frame[8],
        protocol: frame[9],
        source: Ipv4Addr::new(frame[12], frame[13], frame[14], frame[15]),
        destination: Ipv4Addr::new(frame[16], frame[17], frame[18], frame[19]),
    };

    let icmp_bytes = &frame[header_len..];
    let icmp = IcmpHeader {
        icmp_type: icmp_bytes[0],
        icmp_code: icmp_bytes[1],
        checksum: u16::from_be_bytes([icmp_bytes[2], icmp_bytes[3]]),
        identifier: u16::from_be_bytes([icmp_bytes[4], icmp_bytes[5]]),
        identifier_swapped: u16::from_le_bytes([icmp_bytes[4], icmp_bytes[5]]),
        sequence: u16::from_be_bytes([icmp_bytes[6], icmp_bytes[7]]),
        sequence_swapped: u16::from_le_bytes([icmp_bytes[6], icmp_bytes[7]]),
    };

    Ok(InboundDatagram { ip, icmp, frame_len: frame.len() })
}
