//! RFC 1071 Internet checksum.

/// One's complement sum of big-endian 16-bit words.
///
/// An odd trailing byte is the high byte of a final word.
fn sum_words(data: &[u8], mut sum: u64) -> u64 {
    let mut chunks = data.chunks_exact(2);
    for c in &mut chunks {
        sum += u16::from_be_bytes([c[0], c[1]]) as u64;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u64) << 8;
    }
    sum
}

fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

pub fn internet_checksum(data: &[u8]) -> u16 {
    fold(sum_words(data, 0))
}

/// Checksum of a HIP packet with its checksum field (offset 4) taken as zero.
///
/// Both halves are word aligned, so summing them separately is the same
/// as summing the packet with the field zeroed.
pub fn packet_checksum(packet: &[u8]) -> u16 {
    if packet.len() < 6 {
        return internet_checksum(packet);
    }
    let sum = sum_words(&packet[..4], 0);
    fold(sum_words(&packet[6..], sum))
}
