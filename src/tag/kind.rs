//! Decode rules for tag values.

use serde::Deserialize;

use super::value::{BitField, Coordinates, Motion, TagValue};
use crate::byte_order::{array_at, read_le_i16, read_le_i32, read_le_u16, read_le_u32};

/// Which names an [`DecodeKind::IoBitfield`] gives its bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoDirection {
    /// Bits are named `input0` … `input15`.
    Inputs,
    /// Bits are named `output0` … `output15`.
    Outputs,
}

/// How the bytes of a tag value are interpreted.
///
/// The width of every kind is fixed, so the decoder always knows where the
/// next tag starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum DecodeKind {
    /// Unsigned 8-bit integer.
    #[serde(rename = "uint8")]
    UInt8,
    /// Unsigned little-endian 16-bit integer.
    #[serde(rename = "uint16")]
    UInt16,
    /// Unsigned little-endian 32-bit integer.
    #[serde(rename = "uint32")]
    UInt32,
    /// Signed 8-bit integer.
    #[serde(rename = "int8")]
    Int8,
    /// Signed little-endian 16-bit integer.
    #[serde(rename = "int16")]
    Int16,
    /// Signed little-endian 32-bit integer.
    #[serde(rename = "int32")]
    Int32,
    /// Text of the given byte length.
    #[serde(rename = "fixed_string")]
    FixedString(usize),
    /// Little-endian `u32` Unix seconds.
    #[serde(rename = "date_time_seconds")]
    DateTimeSeconds,
    /// Nibble-packed fix byte followed by latitude and longitude in millionths of a degree.
    #[serde(rename = "coordinates")]
    Coordinates,
    /// Speed and heading, each a `u16` in tenths.
    #[serde(rename = "speed_direction")]
    SpeedDirection,
    /// Device status flag word.
    #[serde(rename = "status_bits")]
    StatusBits,
    /// Input or output flag word.
    #[serde(rename = "io_bitfield")]
    IoBitfield(IoDirection),
    /// Little-endian `u32` in hundredths.
    #[serde(rename = "modbus_scaled")]
    ModbusScaled,
}

impl DecodeKind {
    /// Number of value bytes following the tag identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use galileo::tag::DecodeKind;
    ///
    /// assert_eq!(DecodeKind::Coordinates.width(), 9);
    /// assert_eq!(DecodeKind::FixedString(15).width(), 15);
    /// ```
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 | Self::StatusBits | Self::IoBitfield(_) => 2,
            Self::UInt32
            | Self::Int32
            | Self::DateTimeSeconds
            | Self::SpeedDirection
            | Self::ModbusScaled => 4,
            Self::Coordinates => 9,
            Self::FixedString(len) => len,
        }
    }

    /// Decode a value from the start of `bytes`.
    ///
    /// Returns `None` when `bytes` is shorter than [`width`](Self::width).
    ///
    /// # Examples
    ///
    /// ```
    /// use galileo::tag::{DecodeKind, TagValue};
    ///
    /// let value = DecodeKind::ModbusScaled.decode(&[0x10, 0x27, 0x00, 0x00]);
    /// assert_eq!(value, Some(TagValue::Scaled(100.0)));
    /// ```
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<TagValue> {
        let value = match self {
            Self::UInt8 => TagValue::Unsigned(u32::from(*bytes.first()?)),
            Self::UInt16 => TagValue::Unsigned(u32::from(read_le_u16(array_at(bytes, 0)?))),
            Self::UInt32 => TagValue::Unsigned(read_le_u32(array_at(bytes, 0)?)),
            Self::Int8 => TagValue::Signed(i32::from(i8::from_le_bytes(array_at(bytes, 0)?))),
            Self::Int16 => TagValue::Signed(i32::from(read_le_i16(array_at(bytes, 0)?))),
            Self::Int32 => TagValue::Signed(read_le_i32(array_at(bytes, 0)?)),
            Self::FixedString(len) => TagValue::Text(decode_text(bytes.get(..len)?)),
            Self::DateTimeSeconds => TagValue::Timestamp(read_le_u32(array_at(bytes, 0)?)),
            Self::Coordinates => TagValue::Coordinates(decode_coordinates(bytes)?),
            Self::SpeedDirection => TagValue::Motion(Motion {
                speed_kmh: f64::from(read_le_u16(array_at(bytes, 0)?)) / 10.0,
                direction_deg: f64::from(read_le_u16(array_at(bytes, 2)?)) / 10.0,
            }),
            Self::StatusBits => TagValue::Bits(BitField::new(read_le_u16(array_at(bytes, 0)?), None)),
            Self::IoBitfield(direction) => TagValue::Bits(BitField::new(
                read_le_u16(array_at(bytes, 0)?),
                Some(direction),
            )),
            Self::ModbusScaled => TagValue::Scaled(f64::from(read_le_u32(array_at(bytes, 0)?)) / 100.0),
        };
        Some(value)
    }
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_owned()
}

fn decode_coordinates(bytes: &[u8]) -> Option<Coordinates> {
    let fix = *bytes.first()?;
    Some(Coordinates {
        satellites: fix & 0x0F,
        fix_quality: fix >> 4,
        latitude: f64::from(read_le_i32(array_at(bytes, 1)?)) / 1_000_000.0,
        longitude: f64::from(read_le_i32(array_at(bytes, 5)?)) / 1_000_000.0,
    })
}
