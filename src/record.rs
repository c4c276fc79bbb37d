//! Decoded records and the machinery producing them.
//!
//! A [`Record`] is an ordered tag → value mapping for one telemetry sample.
//! [`decoder::RecordDecoder`] walks one record's bytes; [`splitter`] decides
//! where the records of a multi-record frame begin and end.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::tag::{IMEI, TagDefinition, TagId, TagValue};

pub mod decoder;
pub mod splitter;

pub use decoder::{DecodedRecord, RecordDecoder};
pub use splitter::{
    MULTI_RECORD_THRESHOLD,
    MarkerScan,
    RecordBoundaryStrategy,
    Segments,
    TagWalk,
    segment_body,
};

/// One decoded tag.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Tag identifier.
    pub tag: TagId,
    /// Value bytes as received.
    pub raw: Bytes,
    /// Decoded value.
    pub value: TagValue,
    /// Definition the value was decoded with.
    pub definition: Arc<TagDefinition>,
}

/// Ordered mapping from tag to decoded field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Insert a field, replacing any earlier field with the same tag in place.
    pub fn insert(&mut self, field: Field) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.tag == field.tag) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Field for `tag`.
    #[must_use]
    pub fn get(&self, tag: TagId) -> Option<&Field> { self.fields.iter().find(|f| f.tag == tag) }

    /// Decoded value for `tag`.
    #[must_use]
    pub fn value(&self, tag: TagId) -> Option<&TagValue> { self.get(tag).map(|f| &f.value) }

    /// The IMEI carried by this record, if any and non-empty.
    #[must_use]
    pub fn imei(&self) -> Option<&str> {
        self.value(IMEI)
            .and_then(TagValue::as_text)
            .filter(|imei| !imei.is_empty())
    }

    /// Fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> { self.fields.iter() }

    /// Tags in wire order.
    pub fn tags(&self) -> impl Iterator<Item = TagId> + '_ { self.iter().map(|f| f.tag) }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize { self.fields.len() }

    /// True when no tag was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

#[derive(Serialize)]
struct FieldView<'a> {
    label: &'a str,
    value: &'a TagValue,
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in self.iter() {
            map.serialize_entry(
                &field.tag,
                &FieldView {
                    label: &field.definition.label,
                    value: &field.value,
                },
            )?;
        }
        map.end()
    }
}

/// A record attributed to a device, as handed to the record sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// IMEI from the record itself, or the last one seen on the connection.
    pub imei: Option<String>,
    /// Archive flag of the frame the record arrived in.
    pub archive_pending: bool,
    /// Decoded fields.
    pub record: Record,
}
