//! Acknowledgements written back to the device.

use crate::byte_order::write_le_u16;

/// First byte of every acknowledgement.
pub const ACK_PREFIX: u8 = 0x02;

/// Three-byte reply to a delimited frame.
///
/// A processed frame is acknowledged by echoing its checksum; the device
/// retransmits when the echo is missing or wrong.
///
/// # Examples
///
/// ```
/// use galileo::frame::Ack;
///
/// assert_eq!(Ack::for_checksum(0x1234).as_bytes(), &[0x02, 0x34, 0x12]);
/// assert_eq!(Ack::REJECTED.as_bytes(), &[0x02, 0x3F, 0x00]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ack([u8; 3]);

impl Ack {
    /// Reply to a frame whose checksum did not verify.
    pub const REJECTED: Self = Self([ACK_PREFIX, 0x3F, 0x00]);

    /// Reply echoing `checksum`.
    #[must_use]
    pub fn for_checksum(checksum: u16) -> Self {
        let [lo, hi] = write_le_u16(checksum);
        Self([ACK_PREFIX, lo, hi])
    }

    /// Wire bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 3] { &self.0 }
}

impl AsRef<[u8]> for Ack {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_echoed_low_byte_first() {
        assert_eq!(Ack::for_checksum(0xBEEF).as_bytes(), &[0x02, 0xEF, 0xBE]);
    }

    #[test]
    fn rejection_differs_from_typical_echo() {
        assert_ne!(Ack::for_checksum(0x3F01), Ack::REJECTED);
    }
}
