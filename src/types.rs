use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Query region as callers express it: 1-based, fully-closed coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    pub start: u64,
    pub end: u64,
}

/// 0-based, half-open interbase interval.
///
/// All internal coordinate math uses this form. The 1-based closed form used
/// by external query APIs is translated exactly once, at the API boundary,
/// via [`Interval::from_one_based`]. An off-by-one in that translation
/// corrupts every downstream coordinate, so it lives here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidRange(format!(
                "interval start {start} must be less than end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Translate a 1-based closed `[start, end]` into interbase `[start-1, end)`.
    pub fn from_one_based(start: u64, end: u64) -> Result<Self> {
        if start == 0 {
            return Err(Error::InvalidRange(
                "1-based coordinates start at 1, got 0".into(),
            ));
        }
        Self::new(start - 1, end)
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn to_i8(self) -> i8 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

/// Mate locus of a paired record, as the decoder reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mate {
    pub reference_id: usize,
    /// 1-based.
    pub alignment_start: u64,
}

/// A decoded alignment record as yielded by the container decoder, before
/// materialization into a [`Feature`].
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub unique_id: u64,
    pub read_name: String,
    /// 1-based; 0 means the decoder failed to assign a position.
    pub alignment_start: u64,
    pub length_on_ref: u64,
    pub mapping_quality: u8,
    pub flags: u16,
    pub cram_flags: u8,
    pub read_bases: String,
    /// Numeric Phred scores, pre-offset.
    pub quality_scores: Vec<u8>,
    pub read_features: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub mate: Option<Mate>,
    pub reverse_complemented: bool,
    pub qc_failed: bool,
    pub secondary: bool,
    pub supplementary: bool,
    pub paired: bool,
    pub properly_paired: bool,
    pub mate_unmapped: bool,
    pub unmapped: bool,
}

impl RawRecord {
    /// The interbase interval this record covers on the reference.
    pub fn reference_interval(&self) -> Interval {
        let start = self.alignment_start.saturating_sub(1);
        Interval {
            start,
            end: start + self.length_on_ref,
        }
    }
}

/// The externally-visible feature a query yields. Immutable once constructed;
/// identity is the record's unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub name: String,
    /// Interbase.
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub mapping_quality: u8,
    /// `"0x"` + lowercase hexadecimal.
    pub flags: String,
    pub cram_flags: String,
    /// Quality scores offset by +33, rendered as space-joined decimal
    /// values; empty if no scores.
    pub qual: String,
    pub seq: String,
    pub read_features: Vec<String>,
    pub qc_failed: bool,
    pub secondary_alignment: bool,
    pub supplementary_alignment: bool,
    pub multi_segment_template: bool,
    pub multi_segment_all_correctly_aligned: bool,
    pub multi_segment_next_segment_unmapped: bool,
    pub unmapped: bool,
    pub next_seq_id: Option<String>,
    /// `"refName:pos"`, present only when the mate's reference resolves.
    pub next_segment_position: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// Aggregate feature-density summary, computed once after index readiness and
/// memoized for the store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalStats {
    pub feature_density: f64,
    pub feature_count: u64,
    pub sampled_span: u64,
}

/// Minimal state sufficient to reconstruct a store; the only externally
/// persisted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "indexUrl", skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_translation() {
        let interval = Interval::from_one_based(1000, 1050).unwrap();
        assert_eq!(interval.start, 999);
        assert_eq!(interval.end, 1050);
        assert_eq!(interval.len(), 51);
    }

    #[test]
    fn test_one_based_rejects_zero_start() {
        assert!(matches!(
            Interval::from_one_based(0, 100),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_interval_rejects_inverted_bounds() {
        assert!(Interval::new(50, 50).is_err());
        assert!(Interval::new(51, 50).is_err());
    }

    #[test]
    fn test_intersects() {
        let query = Interval::new(999, 1050).unwrap();
        assert!(query.intersects(&Interval::new(999, 1049).unwrap()));
        assert!(query.intersects(&Interval::new(0, 1000).unwrap()));
        assert!(!query.intersects(&Interval::new(0, 999).unwrap()));
        assert!(!query.intersects(&Interval::new(1050, 2000).unwrap()));
    }

    #[test]
    fn test_record_reference_interval() {
        let record = RawRecord {
            alignment_start: 1000,
            length_on_ref: 50,
            ..RawRecord::default()
        };
        let interval = record.reference_interval();
        assert_eq!(interval.start, 999);
        assert_eq!(interval.end, 1049);
    }

    #[test]
    fn test_strand_symbols() {
        assert_eq!(Strand::Forward.to_i8(), 1);
        assert_eq!(Strand::Reverse.to_i8(), -1);
    }

    #[test]
    fn test_descriptor_round_trip() {
        let descriptor = StoreDescriptor {
            url: Some("http://example.com/data.cram".to_string()),
            index_url: Some("http://example.com/data.cram.crai".to_string()),
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let parsed: StoreDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.url, descriptor.url);
        assert_eq!(parsed.index_url, descriptor.index_url);
    }
}
