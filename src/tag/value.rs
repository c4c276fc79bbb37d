//! Decoded tag values.

use serde::{Serialize, Serializer, ser::SerializeStruct};

use super::IoDirection;

/// Typed value of one decoded tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    /// Unsigned integer from a `UInt8`, `UInt16` or `UInt32` tag.
    Unsigned(u32),
    /// Signed integer from an `Int8`, `Int16` or `Int32` tag.
    Signed(i32),
    /// Fixed-length text such as the IMEI.
    Text(String),
    /// Unix timestamp in seconds.
    Timestamp(u32),
    /// Satellite fix and position.
    Coordinates(Coordinates),
    /// Speed and heading.
    Motion(Motion),
    /// Status, input or output flags.
    Bits(BitField),
    /// Modbus register value scaled by 1/100.
    Scaled(f64),
}

impl TagValue {
    /// Text content, if this is a [`TagValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Position block of tag `0x30`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    /// Satellites in view (low nibble of the first byte).
    pub satellites: u8,
    /// Fix correctness indicator (high nibble of the first byte).
    pub fix_quality: u8,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Speed and heading block of tag `0x33`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Motion {
    /// Ground speed in km/h.
    pub speed_kmh: f64,
    /// Heading in degrees.
    pub direction_deg: f64,
}

/// A 16-bit flag word exposed both raw and bit by bit.
///
/// # Examples
///
/// ```
/// use galileo::tag::{BitField, IoDirection};
///
/// let bits = BitField::new(0b101, Some(IoDirection::Inputs));
/// assert!(bits.bit(0));
/// assert!(!bits.bit(1));
/// assert_eq!(bits.name(2), "input2");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitField {
    raw: u16,
    direction: Option<IoDirection>,
}

impl BitField {
    /// Wrap `raw`; `direction` selects the `inputN`/`outputN` names and `None`
    /// selects `statusN`.
    #[must_use]
    pub const fn new(raw: u16, direction: Option<IoDirection>) -> Self { Self { raw, direction } }

    /// The flag word as received.
    #[must_use]
    pub const fn raw(&self) -> u16 { self.raw }

    /// State of bit `index` (bit 0 is the least significant). Out-of-range
    /// indices read as `false`.
    #[must_use]
    pub const fn bit(&self, index: u8) -> bool { index < 16 && self.raw & (1 << index) != 0 }

    /// All sixteen bits, least significant first.
    #[must_use]
    pub fn bits(&self) -> [bool; 16] {
        let mut out = [false; 16];
        for (index, slot) in (0_u8..).zip(out.iter_mut()) {
            *slot = self.bit(index);
        }
        out
    }

    /// Name of bit `index`.
    #[must_use]
    pub fn name(&self, index: u8) -> String {
        let prefix = match self.direction {
            Some(IoDirection::Inputs) => "input",
            Some(IoDirection::Outputs) => "output",
            None => "status",
        };
        format!("{prefix}{index}")
    }
}

struct NamedBits<'a>(&'a BitField);

impl Serialize for NamedBits<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map((0_u8..16).map(|i| (self.0.name(i), self.0.bit(i))))
    }
}

impl Serialize for BitField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BitField", 2)?;
        state.serialize_field("raw", &self.raw)?;
        state.serialize_field("bits", &NamedBits(self))?;
        state.end()
    }
}
