//! The one's-complement Internet checksum (RFC 1071) used by the ICMP header.

/// Computes the 16-bit Internet checksum over `data`.
///
/// The buffer is summed as consecutive big-endian 16-bit words with
/// end-around carry. A trailing odd byte is treated as if padded with one
/// zero byte; the padding is conceptual and never part of the wire data.
#[must_use]
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in words.by_ref() {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
