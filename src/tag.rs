//! Tag identifiers, decode rules and the tag registry.
//!
//! A record body is a sequence of `tag, value` pairs. One-byte tags live in the
//! main table; two-byte tags only appear inside the extended block introduced
//! by [`EXTENDED_ESCAPE`]. Each registered tag names a [`DecodeKind`] which
//! fixes both the value width and how the bytes are interpreted.

use std::fmt;

use serde::{Serialize, Serializer};

pub mod kind;
pub mod registry;
pub mod value;

pub use kind::{DecodeKind, IoDirection};
pub use registry::{TagDefinition, TagRegistry, TagTableError};
pub use value::{BitField, Coordinates, Motion, TagValue};

/// Main tag carrying the device IMEI.
pub const IMEI: TagId = TagId::Main(0x03);

/// Main tag opening a record inside an archive batch (record number).
pub const RECORD_MARKER: u8 = 0x10;

/// Main tag introducing the extended block of two-byte tags.
pub const EXTENDED_ESCAPE: u8 = 0xFE;

/// Bytes skipped in place of a value whose tag is not registered.
pub const UNKNOWN_TAG_WIDTH: usize = 4;

/// Identifier of a tag on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
    /// One-byte identifier in the record body.
    Main(u8),
    /// Two-byte identifier inside the extended block.
    Extended(u16),
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main(id) => write!(f, "{id:#04x}"),
            Self::Extended(id) => write!(f, "{id:#06x}"),
        }
    }
}

impl Serialize for TagId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_to_the_identifier_width() {
        assert_eq!(TagId::Main(0x3).to_string(), "0x03");
        assert_eq!(TagId::Extended(0x1).to_string(), "0x0001");
    }

    #[test]
    fn serializes_as_display_string() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&IMEI)?, "\"0x03\"");
        Ok(())
    }
}
