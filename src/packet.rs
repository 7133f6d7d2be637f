//! Construction of ICMPv4 Echo Request datagrams.
//!
//! Only the ICMP part of the wire format is built here. On a raw ICMPv4
//! socket the kernel prepends the IP header on send.

use crate::checksum::internet_checksum;

pub const ECHO_REQUEST_TYPE: u8 = 8;
pub const ECHO_REPLY_TYPE: u8 = 0;
pub const ECHO_CODE: u8 = 0;

pub const ICMP_HEADER_LEN: usize = 8;

/// Size of the echo payload sent with every probe.
pub const DEFAULT_PAYLOAD_SIZE: usize = 48;

const CHECKSUM_OFFSET: usize = 2;

/// The classic ascending ASCII payload, starting at `'A'`.
#[must_use]
pub fn default_payload() -> [u8; DEFAULT_PAYLOAD_SIZE] {
    let mut payload = [0u8; DEFAULT_PAYLOAD_SIZE];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = b'A' + (i as u8);
    }
    payload
}

/// Assembles a complete Echo Request datagram: 8-byte ICMP header followed
/// by `payload`, with the checksum computed over the whole datagram and
/// written back in network byte order.
#[must_use]
pub fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());
    datagram.extend_from_slice(&[ECHO_REQUEST_TYPE, ECHO_CODE, 0, 0]);
    datagram.extend_from_slice(&identifier.to_be_bytes());
    datagram.extend_from_slice(&sequence.to_be_bytes());
    datagram.extend_from_slice(payload);

    let checksum = internet_checksum(&datagram);
    datagram[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_be_bytes());
    datagram
}
