//! Unsigned LEB128 varints (7 bits per byte, high bit = continuation).

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN64: usize = 10;

/// Appends `value` to `buf` as a uvarint.
pub fn encode_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decodes a uvarint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if `buf`
/// is truncated or the value overflows 64 bits.
pub fn decode_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN64 {
            return None;
        }
        if i == MAX_VARINT_LEN64 - 1 && byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}
