//! Tag-by-tag record decoding, including the extended tag block.

use std::ops::Range;

use bytes::Bytes;
use log::{debug, warn};

use super::{Field, Record};
use crate::{
    byte_order::{array_at, read_le_u16},
    codec::ProtocolError,
    tag::{EXTENDED_ESCAPE, TagId, TagRegistry, UNKNOWN_TAG_WIDTH},
};

/// Width of the extended block length prefix and of each extended tag id.
const EXTENDED_WORD: usize = 2;

/// Output of decoding one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedRecord {
    /// Fields decoded in wire order.
    pub record: Record,
    /// Offset just past the last byte the decoder consumed.
    pub next_offset: usize,
    /// Recoverable anomalies met on the way.
    pub errors: Vec<ProtocolError>,
}

/// Decoder for the tag/value layout of a record.
///
/// Unknown tags never abort a record: their value is skipped with a guessed
/// width of [`UNKNOWN_TAG_WIDTH`] bytes and decoding carries on. A value that
/// runs past the record end stops the walk; everything decoded before it is
/// kept.
#[derive(Clone, Copy, Debug)]
pub struct RecordDecoder<'a> {
    registry: &'a TagRegistry,
}

struct Walk<'b> {
    body: &'b Bytes,
    record: Record,
    errors: Vec<ProtocolError>,
}

impl<'a> RecordDecoder<'a> {
    /// Decoder resolving tags through `registry`.
    #[must_use]
    pub const fn new(registry: &'a TagRegistry) -> Self { Self { registry } }

    /// Decode from `start` to the end of `body`.
    #[must_use]
    pub fn decode_record(&self, body: &Bytes, start: usize) -> DecodedRecord {
        self.decode_range(body, start..body.len())
    }

    /// Decode the record occupying `range` of `body`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use galileo::{
    ///     record::RecordDecoder,
    ///     tag::{TagId, TagRegistry, TagValue},
    /// };
    ///
    /// let registry = TagRegistry::galileosky();
    /// // HDOP (0x35) = 7, then supply voltage (0x41) = 12000 mV.
    /// let body = Bytes::from_static(&[0x35, 0x07, 0x41, 0xE0, 0x2E]);
    /// let decoded = RecordDecoder::new(&registry).decode_range(&body, 0..body.len());
    ///
    /// assert_eq!(decoded.next_offset, 5);
    /// assert_eq!(
    ///     decoded.record.value(TagId::Main(0x41)),
    ///     Some(&TagValue::Unsigned(12_000))
    /// );
    /// ```
    #[must_use]
    pub fn decode_range(&self, body: &Bytes, range: Range<usize>) -> DecodedRecord {
        let end = range.end.min(body.len());
        let mut walk = Walk {
            body,
            record: Record::default(),
            errors: Vec::new(),
        };
        let mut offset = range.start;
        while offset < end {
            let tag_offset = offset;
            let id = body[offset];
            offset += 1;
            if id == EXTENDED_ESCAPE {
                offset = self.decode_extended_block(&mut walk, tag_offset, offset, end);
                continue;
            }
            match self.decode_tag(&mut walk, TagId::Main(id), tag_offset, offset, end) {
                Some(next) => offset = next,
                None => {
                    offset = end;
                    break;
                }
            }
        }
        DecodedRecord {
            record: walk.record,
            next_offset: offset,
            errors: walk.errors,
        }
    }

    /// Decode the value of `tag` found at `tag_offset`, starting at
    /// `value_offset`. Returns the offset after the value, or `None` when the
    /// value does not fit before `end`.
    fn decode_tag(
        &self,
        walk: &mut Walk<'_>,
        tag: TagId,
        tag_offset: usize,
        value_offset: usize,
        end: usize,
    ) -> Option<usize> {
        let remaining = end - value_offset;
        let Some(definition) = self.registry.get(tag) else {
            let skipped = UNKNOWN_TAG_WIDTH.min(remaining);
            warn!("unknown tag {tag} at offset {tag_offset}, skipping {skipped} bytes");
            walk.errors.push(ProtocolError::UnknownTag {
                tag,
                offset: tag_offset,
                skipped,
            });
            return Some(value_offset + skipped);
        };

        let width = definition.kind.width();
        let value = walk
            .body
            .get(value_offset..value_offset + width.min(remaining))
            .and_then(|bytes| definition.kind.decode(bytes));
        let Some(value) = value else {
            warn!("tag {tag} at offset {tag_offset} truncated: needs {width} bytes, {remaining} remain");
            walk.errors.push(ProtocolError::TruncatedValue {
                tag,
                offset: tag_offset,
                needed: width,
                remaining,
            });
            return None;
        };
        walk.record.insert(Field {
            tag,
            raw: walk.body.slice(value_offset..value_offset + width),
            value,
            definition: definition.clone(),
        });
        Some(value_offset + width)
    }

    /// Decode the block following an escape byte at `escape_offset`.
    ///
    /// Entries are read while the cursor is inside the declared length. An
    /// entry that starts inside it is decoded in full even when its value
    /// runs past the declared end, so the walk never resumes in the middle of
    /// a value. Returns the later of the declared end and the end of the last
    /// entry.
    fn decode_extended_block(
        &self,
        walk: &mut Walk<'_>,
        escape_offset: usize,
        offset: usize,
        end: usize,
    ) -> usize {
        let escape = TagId::Main(EXTENDED_ESCAPE);
        let length = array_at(&walk.body[..end], offset).map(read_le_u16);
        let Some(length) = length else {
            walk.errors.push(ProtocolError::TruncatedValue {
                tag: escape,
                offset: escape_offset,
                needed: EXTENDED_WORD,
                remaining: end - offset,
            });
            return end;
        };
        let start = offset + EXTENDED_WORD;
        let declared_end = start + usize::from(length);
        if declared_end > end {
            warn!("extended block at offset {escape_offset} declares {length} bytes, {} remain", end - start);
            walk.errors.push(ProtocolError::TruncatedValue {
                tag: escape,
                offset: escape_offset,
                needed: usize::from(length),
                remaining: end - start,
            });
        }
        let block_end = declared_end.min(end);

        let mut cursor = start;
        while cursor < block_end {
            let Some(id) = array_at(&walk.body[..end], cursor).map(read_le_u16) else {
                walk.errors.push(ProtocolError::TruncatedValue {
                    tag: escape,
                    offset: cursor,
                    needed: EXTENDED_WORD,
                    remaining: end - cursor,
                });
                return end;
            };
            match self.decode_tag(walk, TagId::Extended(id), cursor, cursor + EXTENDED_WORD, end) {
                Some(next) => cursor = next,
                None => return end,
            }
        }
        if cursor > block_end {
            debug!(
                "extended block at offset {escape_offset} declares {length} bytes but its entries span {}",
                cursor - start
            );
        }
        cursor.max(block_end)
    }
}
