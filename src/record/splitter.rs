//! Record boundaries inside multi-record telemetry frames.
//!
//! Frames whose body is shorter than [`MULTI_RECORD_THRESHOLD`] hold a single
//! record. Longer bodies are archive batches, and a
//! [`RecordBoundaryStrategy`] decides where each record starts.
//!
//! [`MarkerScan`] is what deployed devices are known to work with: every byte
//! equal to [`RECORD_MARKER`] opens a record. It does not know tag widths, so a
//! marker byte inside another tag's value (say, the low byte of a voltage)
//! opens a spurious record. [`TagWalk`] splits only at marker bytes found in
//! tag position.

use std::{fmt, ops::Range};

use crate::{
    byte_order::{array_at, read_le_u16},
    tag::{EXTENDED_ESCAPE, RECORD_MARKER, TagId, TagRegistry, UNKNOWN_TAG_WIDTH},
};

/// Body length from which a telemetry frame may carry several records.
pub const MULTI_RECORD_THRESHOLD: usize = 32;

/// Record layout of one frame body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segments {
    /// Bytes before the first record marker. They carry frame-level tags such
    /// as the IMEI and are not a record of their own.
    pub prelude: Option<Range<usize>>,
    /// Record spans in wire order.
    pub records: Vec<Range<usize>>,
}

impl Segments {
    fn whole(len: usize) -> Self {
        Self {
            prelude: None,
            records: vec![0..len],
        }
    }

    fn from_starts(len: usize, starts: &[usize]) -> Self {
        let Some(&first) = starts.first() else {
            return Self::whole(len);
        };
        let records = starts
            .iter()
            .zip(starts.iter().skip(1).chain(std::iter::once(&len)))
            .map(|(&start, &end)| start..end)
            .collect();
        Self {
            prelude: (first > 0).then_some(0..first),
            records,
        }
    }
}

/// Strategy locating record starts in an archive batch body.
pub trait RecordBoundaryStrategy: Send + Sync + fmt::Debug {
    /// Split `body` into a prelude and record spans.
    fn segment(&self, body: &[u8], registry: &TagRegistry) -> Segments;
}

/// Split at every byte equal to the record marker.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkerScan;

impl RecordBoundaryStrategy for MarkerScan {
    fn segment(&self, body: &[u8], _registry: &TagRegistry) -> Segments {
        let starts: Vec<usize> = body
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| (b == RECORD_MARKER).then_some(i))
            .collect();
        Segments::from_starts(body.len(), &starts)
    }
}

/// Split at record markers found in tag position, stepping over values with
/// the registry's widths.
///
/// Unknown tags are stepped over with the same guessed width the decoder
/// uses, so a body containing them may still be mis-split.
#[derive(Clone, Copy, Debug, Default)]
pub struct TagWalk;

impl RecordBoundaryStrategy for TagWalk {
    fn segment(&self, body: &[u8], registry: &TagRegistry) -> Segments {
        let mut starts = Vec::new();
        let mut offset = 0;
        while offset < body.len() {
            let id = body[offset];
            if id == RECORD_MARKER {
                starts.push(offset);
            }
            offset += 1;
            offset = if id == EXTENDED_ESCAPE {
                skip_extended_block(body, offset, registry)
            } else {
                let width = registry
                    .get(TagId::Main(id))
                    .map_or(UNKNOWN_TAG_WIDTH, |d| d.kind.width());
                offset.saturating_add(width)
            };
        }
        Segments::from_starts(body.len(), &starts)
    }
}

/// Offset after the extended block whose length prefix sits at `offset`,
/// stepping entry by entry the way the decoder does.
fn skip_extended_block(body: &[u8], offset: usize, registry: &TagRegistry) -> usize {
    let Some(length) = array_at(body, offset).map(read_le_u16) else {
        return body.len();
    };
    let start = offset + 2;
    let block_end = start.saturating_add(usize::from(length)).min(body.len());
    let mut cursor = start;
    while cursor < block_end {
        let Some(id) = array_at(body, cursor).map(read_le_u16) else {
            return body.len();
        };
        let width = registry
            .get(TagId::Extended(id))
            .map_or(UNKNOWN_TAG_WIDTH, |d| d.kind.width());
        cursor = cursor.saturating_add(2).saturating_add(width);
    }
    cursor.max(block_end)
}

/// Segment a telemetry body, treating short bodies as a single record.
///
/// # Examples
///
/// ```
/// use galileo::{
///     record::{MarkerScan, segment_body},
///     tag::TagRegistry,
/// };
///
/// let registry = TagRegistry::galileosky();
/// let short = [0x10, 0x01, 0x00, 0x10, 0x02, 0x00];
/// let segments = segment_body(&short, &MarkerScan, &registry);
/// assert_eq!(segments.records, vec![0..6]);
/// ```
#[must_use]
pub fn segment_body(
    body: &[u8],
    strategy: &dyn RecordBoundaryStrategy,
    registry: &TagRegistry,
) -> Segments {
    if body.len() < MULTI_RECORD_THRESHOLD {
        return Segments::whole(body.len());
    }
    strategy.segment(body, registry)
}
