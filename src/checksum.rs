//! CRC-16 frame checksum.
//!
//! Galileosky frames carry a CRC-16/MODBUS trailer: reflected polynomial
//! `0xA001`, initial value `0xFFFF`, no final XOR. The checksum covers the
//! header byte, the length field and the body.

/// Reflected CRC-16 polynomial.
pub const POLYNOMIAL: u16 = 0xA001;

/// Register value before any byte is folded in.
pub const INITIAL: u16 = 0xFFFF;

/// Compute the frame checksum of `bytes`.
///
/// Empty input yields [`INITIAL`].
///
/// # Examples
///
/// ```
/// use galileo::checksum::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x4B37);
/// assert_eq!(crc16(&[]), 0xFFFF);
/// ```
#[must_use]
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(INITIAL, |crc, &byte| {
        let mut crc = crc ^ u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLYNOMIAL
            } else {
                crc >> 1
            };
        }
        crc
    })
}

/// Check `received` against the checksum of `bytes`.
///
/// # Examples
///
/// ```
/// use galileo::checksum::{crc16, validate};
///
/// let data = [0x01, 0x02, 0x00, 0x10, 0x20];
/// assert!(validate(&data, crc16(&data)));
/// assert!(!validate(&data, crc16(&data) ^ 1));
/// ```
#[must_use]
pub fn validate(bytes: &[u8], received: u16) -> bool { crc16(bytes) == received }
