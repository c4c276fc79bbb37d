//! Builders for record bodies and complete frames.

use galileo::checksum::crc16;

/// Assembles a record body tag by tag.
#[derive(Clone, Debug, Default)]
pub struct BodyBuilder {
    bytes: Vec<u8>,
}

impl BodyBuilder {
    /// Empty body.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// IMEI tag `0x03` with a 15-byte value, NUL padded.
    #[must_use]
    pub fn imei(mut self, imei: &str) -> Self {
        let mut value = imei.as_bytes().to_vec();
        value.resize(15, 0);
        self.bytes.push(0x03);
        self.bytes.extend_from_slice(&value);
        self
    }

    /// Record marker tag `0x10` with a record number.
    #[must_use]
    pub fn record_number(self, number: u16) -> Self { self.u16(0x10, number) }

    /// One-byte value.
    #[must_use]
    pub fn u8(mut self, tag: u8, value: u8) -> Self {
        self.bytes.extend_from_slice(&[tag, value]);
        self
    }

    /// Little-endian two-byte value.
    #[must_use]
    pub fn u16(mut self, tag: u8, value: u16) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Little-endian four-byte value.
    #[must_use]
    pub fn u32(mut self, tag: u8, value: u32) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Coordinates tag `0x30`.
    #[must_use]
    pub fn coordinates(mut self, satellites: u8, fix: u8, lat_micro: i32, lon_micro: i32) -> Self {
        self.bytes.push(0x30);
        self.bytes.push((fix << 4) | (satellites & 0x0F));
        self.bytes.extend_from_slice(&lat_micro.to_le_bytes());
        self.bytes.extend_from_slice(&lon_micro.to_le_bytes());
        self
    }

    /// Extended block `0xFE` whose declared length covers exactly its entries.
    #[must_use]
    pub fn extended(mut self, build: impl FnOnce(ExtendedBuilder) -> ExtendedBuilder) -> Self {
        let entries = build(ExtendedBuilder::default()).bytes;
        let len = u16::try_from(entries.len()).expect("extended block fits a u16 length");
        self.bytes.push(0xFE);
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(&entries);
        self
    }

    /// Arbitrary bytes.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// The assembled body.
    #[must_use]
    pub fn build(self) -> Vec<u8> { self.bytes }
}

/// Entries of an extended block.
#[derive(Clone, Debug, Default)]
pub struct ExtendedBuilder {
    bytes: Vec<u8>,
}

impl ExtendedBuilder {
    /// Two-byte tag with a four-byte value.
    #[must_use]
    pub fn u32(mut self, tag: u16, value: u32) -> Self {
        self.bytes.extend_from_slice(&tag.to_le_bytes());
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Two-byte tag with arbitrary value bytes.
    #[must_use]
    pub fn raw(mut self, tag: u16, value: &[u8]) -> Self {
        self.bytes.extend_from_slice(&tag.to_le_bytes());
        self.bytes.extend_from_slice(value);
        self
    }
}

/// Wrap `body` in a frame with the given header and archive flag.
#[must_use]
pub fn frame(header: u8, body: &[u8], archive_pending: bool) -> Vec<u8> {
    let len = u16::try_from(body.len()).expect("body fits the length field");
    assert!(len <= 0x7FFF, "body exceeds the 15-bit length field");
    let field = if archive_pending { len | 0x8000 } else { len };
    let mut out = vec![header];
    out.extend_from_slice(&field.to_le_bytes());
    out.extend_from_slice(body);
    let crc = crc16(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Telemetry frame (`0x01`) without the archive flag.
#[must_use]
pub fn telemetry_frame(body: &[u8]) -> Vec<u8> { frame(0x01, body, false) }

/// Keepalive frame (`0x15`).
#[must_use]
pub fn keepalive_frame() -> Vec<u8> { frame(0x15, &[0x00], false) }

/// Checksum carried by a complete frame.
#[must_use]
pub fn checksum_of(frame: &[u8]) -> u16 {
    let n = frame.len();
    u16::from_le_bytes([frame[n - 2], frame[n - 1]])
}
