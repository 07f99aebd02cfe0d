//! Little-endian slice readers for the on-disk dBase structures.
//!
//! The classic dBase layout stores every multi-byte integer little-endian;
//! values are decoded field by field at their documented offsets rather than
//! through a struct overlay.

/// Reads a `u16` stored little-endian at the start of `bytes`.
///
/// # Panics
///
/// Panics if `bytes` has fewer than two elements.
#[inline]
#[must_use]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Reads a `u32` stored little-endian at the start of `bytes`.
///
/// # Panics
///
/// Panics if `bytes` has fewer than four elements.
#[inline]
#[must_use]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
