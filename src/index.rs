//! CRAI index adapter.
//!
//! Translates (reference id, coordinate interval) queries into ordered,
//! merged container byte spans. Container spans are emitted so that, combined
//! with each container's min/max-coordinate metadata, no record overlapping
//! the queried interval is skipped; the decoder may therefore yield records
//! from slightly wider spans than requested, and the query engine filters
//! per record.

use crate::storage::ByteSource;
use crate::types::Interval;
use crate::{Error, Result};
use noodles::cram::crai;
use std::collections::BTreeSet;

/// A contiguous byte span within the alignment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub offset: u64,
    pub length: u64,
}

impl ByteSpan {
    fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Coordinate index over containers, consumed pre-built.
pub trait AlignmentIndex: Send + Sync {
    /// Used both as a readiness probe and a data-presence probe.
    fn has_data_for_reference(&self, reference_id: usize) -> bool;

    /// Ordered, merged byte spans of containers overlapping `interval`.
    fn spans_for_range(&self, reference_id: usize, interval: Interval) -> Vec<ByteSpan>;

    /// Reference ids the index holds data for, ascending and deduplicated.
    fn reference_ids(&self) -> Vec<usize>;
}

/// CRAI-backed [`AlignmentIndex`].
pub struct CraiIndex {
    records: crai::Index,
}

impl CraiIndex {
    /// Load and parse a whole CRAI index from a byte source.
    pub async fn load(source: &dyn ByteSource) -> Result<Self> {
        let bytes = source.read_all().await?;
        let records = crai::Reader::new(bytes.as_ref())
            .read_index()
            .map_err(|e| Error::Decode(format!("failed to read CRAI index: {e}")))?;
        tracing::debug!(entries = records.len(), "loaded CRAI index");
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: crai::Index) -> Self {
        Self { records }
    }

    /// Interbase interval a CRAI record's container covers, if mapped.
    fn container_interval(record: &crai::Record) -> Option<Interval> {
        let start = usize::from(record.alignment_start()?) as u64 - 1;
        let span = record.alignment_span() as u64;
        (span > 0).then_some(Interval {
            start,
            end: start + span,
        })
    }
}

impl AlignmentIndex for CraiIndex {
    fn has_data_for_reference(&self, reference_id: usize) -> bool {
        self.records
            .iter()
            .any(|r| r.reference_sequence_id() == Some(reference_id))
    }

    fn reference_ids(&self) -> Vec<usize> {
        let ids: BTreeSet<usize> = self
            .records
            .iter()
            .filter_map(|r| r.reference_sequence_id())
            .collect();
        ids.into_iter().collect()
    }

    fn spans_for_range(&self, reference_id: usize, interval: Interval) -> Vec<ByteSpan> {
        let mut spans = Vec::new();

        for record in &self.records {
            if record.reference_sequence_id() != Some(reference_id) {
                continue;
            }
            let Some(container) = Self::container_interval(record) else {
                continue;
            };
            if container.intersects(&interval) {
                spans.push(ByteSpan {
                    offset: record.offset(),
                    length: record.slice_length(),
                });
            }
        }

        merge_spans(spans)
    }
}

/// Merge overlapping or adjacent byte spans, sorted by offset.
fn merge_spans(mut spans: Vec<ByteSpan>) -> Vec<ByteSpan> {
    if spans.is_empty() {
        return spans;
    }

    spans.sort_by_key(|s| s.offset);

    let mut merged = Vec::with_capacity(spans.len());
    let mut current = spans[0];

    for span in spans.into_iter().skip(1) {
        if span.offset <= current.end() {
            let end = current.end().max(span.end());
            current.length = end - current.offset;
        } else {
            merged.push(current);
            current = span;
        }
    }
    merged.push(current);

    merged
}
