//! Value layout of range-key records.
//!
//! A range-key record is keyed by its start key; the value carries the rest:
//!
//! ```text
//! [end_len: u32 LE][end][suffix_len: u32 LE][suffix][value ...]
//! ```
//!
//! `RANGEKEYDEL` records carry an empty suffix and value. Range deletions do
//! not use this layout: their value is the raw end key.

use anyhow::{ensure, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// The decoded body of a range-key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeKeyValue<'a> {
    pub end: &'a [u8],
    pub suffix: &'a [u8],
    pub value: &'a [u8],
}

/// Encodes a range-key value body.
pub fn encode_range_key_value(end: &[u8], suffix: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + end.len() + suffix.len() + value.len());
    // Writes into a Vec cannot fail.
    let _ = buf.write_u32::<LittleEndian>(end.len() as u32);
    buf.extend_from_slice(end);
    let _ = buf.write_u32::<LittleEndian>(suffix.len() as u32);
    buf.extend_from_slice(suffix);
    buf.extend_from_slice(value);
    buf
}

/// Decodes a range-key value body.
///
/// # Errors
///
/// Returns an error if a length prefix is truncated or points past the end
/// of `raw`.
pub fn decode_range_key_value(raw: &[u8]) -> Result<RangeKeyValue<'_>> {
    let (end, rest) = read_prefixed(raw).context("range key end")?;
    let (suffix, value) = read_prefixed(rest).context("range key suffix")?;
    Ok(RangeKeyValue { end, suffix, value })
}

fn read_prefixed(mut buf: &[u8]) -> Result<(&[u8], &[u8])> {
    let len = buf.read_u32::<LittleEndian>()? as usize;
    ensure!(
        len <= buf.len(),
        "length prefix {len} exceeds remaining {} bytes",
        buf.len()
    );
    Ok(buf.split_at(len))
}
