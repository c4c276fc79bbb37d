//! Helpers for the little-endian integers used on the Galileosky wire.
//!
//! Every multi-byte integer in a frame (length field, checksum, tag values,
//! extended tag identifiers) is little-endian. These helpers keep the Clippy
//! expectation scoped to the conversion points and give the decoder a single
//! place to slice fixed-width values out of a buffer.

/// Parse a little-endian `u16`.
///
/// # Examples
///
/// ```
/// use galileo::byte_order::read_le_u16;
///
/// assert_eq!(read_le_u16([0x34, 0x12]), 0x1234);
/// ```
#[must_use]
pub fn read_le_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Galileosky frames are little-endian on the wire."
    )]
    u16::from_le_bytes(bytes)
}

/// Serialise a `u16` in little-endian order.
///
/// # Examples
///
/// ```
/// use galileo::byte_order::write_le_u16;
///
/// assert_eq!(write_le_u16(0x1234), [0x34, 0x12]);
/// ```
#[must_use]
pub fn write_le_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Galileosky frames are little-endian on the wire."
    )]
    value.to_le_bytes()
}

/// Parse a little-endian `u32`.
#[must_use]
pub fn read_le_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Galileosky frames are little-endian on the wire."
    )]
    u32::from_le_bytes(bytes)
}

/// Parse a little-endian `i16`.
#[must_use]
pub fn read_le_i16(bytes: [u8; 2]) -> i16 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Galileosky frames are little-endian on the wire."
    )]
    i16::from_le_bytes(bytes)
}

/// Parse a little-endian `i32`.
#[must_use]
pub fn read_le_i32(bytes: [u8; 4]) -> i32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Galileosky frames are little-endian on the wire."
    )]
    i32::from_le_bytes(bytes)
}

/// Copy `N` bytes starting at `offset` into an array.
///
/// Returns `None` when fewer than `N` bytes remain.
///
/// # Examples
///
/// ```
/// use galileo::byte_order::array_at;
///
/// let buf = [1_u8, 2, 3, 4];
/// assert_eq!(array_at::<2>(&buf, 1), Some([2, 3]));
/// assert_eq!(array_at::<4>(&buf, 1), None);
/// ```
#[must_use]
pub fn array_at<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case([0x00, 0x80], -32768)]
    #[case([0xFF, 0xFF], -1)]
    #[case([0x01, 0x00], 1)]
    fn signed_u16_reads(#[case] bytes: [u8; 2], #[case] expected: i16) {
        assert_eq!(read_le_i16(bytes), expected);
    }

    #[test]
    fn u32_reads_least_significant_byte_first() {
        assert_eq!(read_le_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(read_le_i32([0xFF, 0xFF, 0xFF, 0xFF]), -1);
    }

    #[test]
    fn array_at_rejects_overflowing_offsets() {
        assert_eq!(array_at::<2>(&[1, 2], usize::MAX), None);
    }
}
