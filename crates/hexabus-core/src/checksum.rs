//! Frame checksum
//!
//! The trailing 16-bit checksum of every frame is the CRC-16 variant used by
//! the device firmware, computed byte-by-byte over the magic, header and
//! payload.

/// Compute the frame checksum over `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |crc, &b| update(crc, b))
}

#[inline]
fn update(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    crc = crc.rotate_left(8);
    crc ^= (crc & 0xff00) << 4;
    crc ^= (crc >> 8) >> 4;
    crc ^= (crc & 0xff00) >> 5;
    crc
}
