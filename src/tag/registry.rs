//! Registry mapping tag identifiers to their definitions.
//!
//! [`TagRegistry::galileosky`] carries the built-in Galileosky table. Vendor
//! specific tags can be added with [`TagRegistry::register_tag`] or loaded from
//! a TOML table before the registry is frozen behind an `Arc` and shared by
//! every session.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

use super::{DecodeKind, EXTENDED_ESCAPE, IoDirection, TagId};
use crate::frame::framer::MAX_BODY_LENGTH;

/// Static description of one tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagDefinition {
    /// Identifier on the wire.
    pub id: TagId,
    /// Decode rule, which also fixes the value width.
    pub kind: DecodeKind,
    /// Human readable name.
    pub label: String,
}

impl TagDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(id: TagId, kind: DecodeKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
        }
    }
}

/// Errors raised while registering or loading tag definitions.
#[derive(Debug, Error)]
pub enum TagTableError {
    /// The escape byte cannot be registered as an ordinary tag.
    #[error("tag {0} is reserved for the extended block")]
    Reserved(TagId),

    /// The value could never fit in a frame body.
    #[error("tag {tag} declares a {width} byte value, more than a frame body can hold")]
    WidthTooLarge {
        /// Offending tag.
        tag: TagId,
        /// Declared value width.
        width: usize,
    },

    /// A main tag identifier does not fit in one byte.
    #[error("main tag id {0:#x} does not fit in one byte")]
    IdOutOfRange(u16),

    /// The tag table could not be read.
    #[error("failed to read tag table {path}: {source}")]
    Io {
        /// File that failed to load.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The tag table is not valid TOML or has an unexpected shape.
    #[error("invalid tag table: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize)]
struct TagTable {
    #[serde(default, rename = "tag")]
    tags: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    id: u16,
    #[serde(default)]
    extended: bool,
    kind: DecodeKind,
    label: String,
}

/// Lookup table of tag definitions.
///
/// # Examples
///
/// ```
/// use galileo::tag::{DecodeKind, TagDefinition, TagId, TagRegistry};
///
/// let mut registry = TagRegistry::galileosky();
/// registry
///     .register_tag(TagDefinition::new(TagId::Main(0x60), DecodeKind::UInt16, "fuel level"))
///     .expect("0x60 is an ordinary tag");
/// assert_eq!(registry.get(TagId::Main(0x60)).map(|d| d.kind), Some(DecodeKind::UInt16));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    main: HashMap<u8, Arc<TagDefinition>>,
    extended: HashMap<u16, Arc<TagDefinition>>,
}

impl TagRegistry {
    /// Registry with no tags at all.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Registry preloaded with the Galileosky tag table.
    #[must_use]
    pub fn galileosky() -> Self {
        let mut registry = Self::empty();
        for (id, kind, label) in MAIN_TAGS {
            registry.insert(TagDefinition::new(TagId::Main(*id), *kind, *label));
        }
        for (id, label) in CAN_TAGS {
            let kind = match *id {
                0xC4..=0xD2 => DecodeKind::UInt8,
                0xD6..=0xDA => DecodeKind::UInt16,
                _ => DecodeKind::UInt32,
            };
            registry.insert(TagDefinition::new(TagId::Main(*id), kind, *label));
        }
        for slot in 0_u16..16 {
            registry.insert(TagDefinition::new(
                TagId::Extended(slot + 1),
                DecodeKind::ModbusScaled,
                format!("modbus {slot}"),
            ));
        }
        registry
    }

    /// Add or replace a definition, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`TagTableError::Reserved`] for the extended block escape tag
    /// and [`TagTableError::WidthTooLarge`] for a value wider than
    /// [`MAX_BODY_LENGTH`].
    pub fn register_tag(
        &mut self,
        definition: TagDefinition,
    ) -> Result<Option<Arc<TagDefinition>>, TagTableError> {
        check_definition(&definition)?;
        Ok(self.insert(definition))
    }

    fn insert(&mut self, definition: TagDefinition) -> Option<Arc<TagDefinition>> {
        match definition.id {
            TagId::Main(id) => self.main.insert(id, Arc::new(definition)),
            TagId::Extended(id) => self.extended.insert(id, Arc::new(definition)),
        }
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: TagId) -> Option<&Arc<TagDefinition>> {
        match id {
            TagId::Main(id) => self.main.get(&id),
            TagId::Extended(id) => self.extended.get(&id),
        }
    }

    /// Number of registered tags across both tables.
    #[must_use]
    pub fn len(&self) -> usize { self.main.len() + self.extended.len() }

    /// True when no tags are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Register every `[[tag]]` entry of a TOML table, returning how many were
    /// added or replaced.
    ///
    /// ```toml
    /// [[tag]]
    /// id = 0x60
    /// kind = "uint16"
    /// label = "fuel level"
    ///
    /// [[tag]]
    /// id = 0x0011
    /// extended = true
    /// kind = { fixed_string = 8 }
    /// label = "driver code"
    /// ```
    ///
    /// Entries are validated before any of them is registered, so a failed
    /// load leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TagTableError::Parse`] for malformed TOML,
    /// [`TagTableError::IdOutOfRange`] for a main id above `0xFF`,
    /// [`TagTableError::Reserved`] for the escape tag, and
    /// [`TagTableError::WidthTooLarge`] for an impossible value width.
    pub fn load_toml(&mut self, text: &str) -> Result<usize, TagTableError> {
        let table: TagTable = toml::from_str(text)?;
        let definitions = table
            .tags
            .into_iter()
            .map(|entry| {
                let id = if entry.extended {
                    TagId::Extended(entry.id)
                } else {
                    let id = u8::try_from(entry.id)
                        .map_err(|_| TagTableError::IdOutOfRange(entry.id))?;
                    TagId::Main(id)
                };
                let definition = TagDefinition::new(id, entry.kind, entry.label);
                check_definition(&definition)?;
                Ok(definition)
            })
            .collect::<Result<Vec<_>, TagTableError>>()?;
        let count = definitions.len();
        for definition in definitions {
            self.insert(definition);
        }
        Ok(count)
    }

    /// Load a TOML tag table from `path` on top of the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`TagTableError::Io`] if the file cannot be read, otherwise the
    /// errors of [`load_toml`](Self::load_toml).
    pub fn galileosky_with_file(path: &Path) -> Result<Self, TagTableError> {
        let text = fs::read_to_string(path).map_err(|source| TagTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut registry = Self::galileosky();
        registry.load_toml(&text)?;
        Ok(registry)
    }
}

fn check_definition(definition: &TagDefinition) -> Result<(), TagTableError> {
    if definition.id == TagId::Main(EXTENDED_ESCAPE) {
        return Err(TagTableError::Reserved(definition.id));
    }
    let width = definition.kind.width();
    if width > MAX_BODY_LENGTH {
        return Err(TagTableError::WidthTooLarge {
            tag: definition.id,
            width,
        });
    }
    Ok(())
}

const MAIN_TAGS: &[(u8, DecodeKind, &str)] = &[
    (0x01, DecodeKind::UInt8, "hardware version"),
    (0x02, DecodeKind::UInt8, "firmware version"),
    (0x03, DecodeKind::FixedString(15), "IMEI"),
    (0x04, DecodeKind::UInt16, "device id"),
    (0x10, DecodeKind::UInt16, "record number"),
    (0x20, DecodeKind::DateTimeSeconds, "date and time"),
    (0x30, DecodeKind::Coordinates, "coordinates"),
    (0x33, DecodeKind::SpeedDirection, "speed and direction"),
    (0x34, DecodeKind::Int16, "height"),
    (0x35, DecodeKind::UInt8, "HDOP"),
    (0x40, DecodeKind::StatusBits, "device status"),
    (0x41, DecodeKind::UInt16, "supply voltage"),
    (0x42, DecodeKind::UInt16, "battery voltage"),
    (0x43, DecodeKind::Int8, "internal temperature"),
    (0x44, DecodeKind::UInt32, "acceleration"),
    (0x45, DecodeKind::IoBitfield(IoDirection::Outputs), "outputs status"),
    (0x46, DecodeKind::IoBitfield(IoDirection::Inputs), "inputs status"),
    (0x50, DecodeKind::UInt16, "input voltage 0"),
    (0x51, DecodeKind::UInt16, "input voltage 1"),
    (0x52, DecodeKind::UInt16, "input voltage 2"),
    (0x53, DecodeKind::UInt16, "input voltage 3"),
    (0x58, DecodeKind::UInt16, "RS232 0"),
    (0x59, DecodeKind::UInt16, "RS232 1"),
    (0x70, DecodeKind::UInt16, "thermometer 0"),
    (0x71, DecodeKind::UInt16, "thermometer 1"),
    (0x72, DecodeKind::UInt16, "thermometer 2"),
    (0x73, DecodeKind::UInt16, "thermometer 3"),
    (0x90, DecodeKind::UInt32, "iButton 0"),
    (0xD3, DecodeKind::UInt32, "iButton 1"),
    (0xD4, DecodeKind::UInt32, "total mileage"),
    (0xD5, DecodeKind::UInt8, "iButton state"),
    (0xE2, DecodeKind::UInt32, "user data 0"),
    (0xE3, DecodeKind::UInt32, "user data 1"),
    (0xE4, DecodeKind::UInt32, "user data 2"),
    (0xE5, DecodeKind::UInt32, "user data 3"),
    (0xE6, DecodeKind::UInt32, "user data 4"),
    (0xE7, DecodeKind::UInt32, "user data 5"),
    (0xE8, DecodeKind::UInt32, "user data 6"),
    (0xE9, DecodeKind::UInt32, "user data 7"),
];

// CAN bus readouts; widths follow the id ranges in `TagRegistry::galileosky`.
const CAN_TAGS: &[(u8, &str)] = &[
    (0xC0, "CAN fuel total"),
    (0xC1, "CAN fuel level, temperature, rpm"),
    (0xC2, "CAN mileage"),
    (0xC3, "CAN B1"),
    (0xC4, "CAN8BITR0"),
    (0xC5, "CAN8BITR1"),
    (0xC6, "CAN8BITR2"),
    (0xC7, "CAN8BITR3"),
    (0xC8, "CAN8BITR4"),
    (0xC9, "CAN8BITR5"),
    (0xCA, "CAN8BITR6"),
    (0xCB, "CAN8BITR7"),
    (0xCC, "CAN8BITR8"),
    (0xCD, "CAN8BITR9"),
    (0xCE, "CAN8BITR10"),
    (0xCF, "CAN8BITR11"),
    (0xD0, "CAN8BITR12"),
    (0xD1, "CAN8BITR13"),
    (0xD2, "CAN8BITR14"),
    (0xD6, "CAN16BITR0"),
    (0xD7, "CAN16BITR1"),
    (0xD8, "CAN16BITR2"),
    (0xD9, "CAN16BITR3"),
    (0xDA, "CAN16BITR4"),
    (0xDB, "CAN32BITR0"),
    (0xDC, "CAN32BITR1"),
    (0xDD, "CAN32BITR2"),
    (0xDE, "CAN32BITR3"),
    (0xDF, "CAN32BITR4"),
];

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TagId::Main(0x03), DecodeKind::FixedString(15))]
    #[case(TagId::Main(0x30), DecodeKind::Coordinates)]
    #[case(TagId::Main(0xC4), DecodeKind::UInt8)]
    #[case(TagId::Main(0xD8), DecodeKind::UInt16)]
    #[case(TagId::Main(0xDF), DecodeKind::UInt32)]
    #[case(TagId::Extended(0x0001), DecodeKind::ModbusScaled)]
    #[case(TagId::Extended(0x0010), DecodeKind::ModbusScaled)]
    fn built_in_table_has_expected_kinds(#[case] id: TagId, #[case] kind: DecodeKind) {
        let definition = TagRegistry::galileosky().get(id).cloned();
        assert_eq!(definition.map(|d| d.kind), Some(kind));
    }

    #[test]
    fn built_in_table_stops_after_sixteen_modbus_slots() {
        let registry = TagRegistry::galileosky();
        assert!(registry.get(TagId::Extended(0x0011)).is_none());
        assert_eq!(
            registry.get(TagId::Extended(0x0001)).map(|d| d.label.as_str()),
            Some("modbus 0")
        );
    }

    #[test]
    fn escape_tag_cannot_be_registered() {
        let mut registry = TagRegistry::empty();
        let err = registry
            .register_tag(TagDefinition::new(
                TagId::Main(EXTENDED_ESCAPE),
                DecodeKind::UInt8,
                "nope",
            ))
            .expect_err("escape tag must be rejected");
        assert!(matches!(err, TagTableError::Reserved(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn oversized_value_width_is_rejected() {
        let mut registry = TagRegistry::empty();
        let err = registry
            .register_tag(TagDefinition::new(
                TagId::Extended(0x20),
                DecodeKind::FixedString(MAX_BODY_LENGTH + 1),
                "runaway",
            ))
            .expect_err("width exceeds any frame body");
        assert!(matches!(
            err,
            TagTableError::WidthTooLarge {
                tag: TagId::Extended(0x20),
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn register_tag_returns_replaced_definition() -> Result<(), TagTableError> {
        let mut registry = TagRegistry::galileosky();
        let replaced = registry.register_tag(TagDefinition::new(
            TagId::Main(0x41),
            DecodeKind::UInt32,
            "wide supply voltage",
        ))?;
        assert_eq!(replaced.map(|d| d.kind), Some(DecodeKind::UInt16));
        Ok(())
    }

    #[test]
    fn toml_table_adds_main_and_extended_tags() -> Result<(), TagTableError> {
        let mut registry = TagRegistry::empty();
        let count = registry.load_toml(
            r#"
            [[tag]]
            id = 0x60
            kind = "uint16"
            label = "fuel level"

            [[tag]]
            id = 0x0011
            extended = true
            kind = { fixed_string = 8 }
            label = "driver code"
            "#,
        )?;
        assert_eq!(count, 2);
        assert_eq!(
            registry.get(TagId::Main(0x60)).map(|d| d.label.as_str()),
            Some("fuel level")
        );
        assert_eq!(
            registry.get(TagId::Extended(0x11)).map(|d| d.kind),
            Some(DecodeKind::FixedString(8))
        );
        Ok(())
    }

    #[rstest]
    #[case("[[tag]]\nid = 0x100\nkind = \"uint8\"\nlabel = \"x\"")]
    #[case("[[tag]]\nid = 0xFE\nkind = \"uint8\"\nlabel = \"x\"")]
    #[case("[[tag]]\nid = 1\nkind = \"float\"\nlabel = \"x\"")]
    #[case("[[tag]]\nid = 0x60\nkind = { fixed_string = 100000 }\nlabel = \"x\"")]
    fn invalid_tables_leave_registry_unchanged(#[case] text: &str) {
        let mut registry = TagRegistry::empty();
        assert!(registry.load_toml(text).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TagRegistry::galileosky_with_file(Path::new("/nonexistent/tags.toml"))
            .expect_err("file does not exist");
        assert!(err.to_string().contains("/nonexistent/tags.toml"));
    }
}
