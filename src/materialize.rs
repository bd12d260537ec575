//! Raw record to feature materialization.

use crate::refseq::ReferenceContext;
use crate::types::{Feature, RawRecord, Strand};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Built-in feature fields a decoded tag must never shadow.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "name",
    "start",
    "end",
    "strand",
    "seq",
    "qual",
    "flags",
    "cram_flags",
];

/// Convert a raw decoded record into its externally-visible feature form.
/// Pure; the only lookup is mate reference-id to name resolution.
///
/// Invariant: `feature.end - feature.start == record.length_on_ref` exactly.
/// A record the decoder failed to place, or whose coordinates overflow, is a
/// decode error, never a silently clamped feature.
pub fn materialize(record: &RawRecord, context: &dyn ReferenceContext) -> Result<Feature> {
    if record.alignment_start == 0 {
        return Err(Error::Decode(format!(
            "record {} has no alignment start",
            record.read_name
        )));
    }

    let start = record.alignment_start - 1;
    let end = start.checked_add(record.length_on_ref).ok_or_else(|| {
        Error::Decode(format!(
            "record {} end coordinate overflows",
            record.read_name
        ))
    })?;
    debug_assert_eq!(end - start, record.length_on_ref);

    let strand = if record.reverse_complemented {
        Strand::Reverse
    } else {
        Strand::Forward
    };

    let qual = record
        .quality_scores
        .iter()
        .map(|&q| (u16::from(q) + 33).to_string())
        .collect::<Vec<_>>()
        .join(" ");

    // Mate locus is present only when the mate's reference id resolves to a
    // name; an unresolvable id omits the fields rather than erroring.
    let (next_seq_id, next_segment_position) = match &record.mate {
        Some(mate) => match context.resolve_reference_name(mate.reference_id) {
            Some(name) => {
                let position = format!("{}:{}", name, mate.alignment_start);
                (Some(name), Some(position))
            }
            None => (None, None),
        },
        None => (None, None),
    };

    let mut tags = BTreeMap::new();
    for (key, value) in &record.tags {
        if RESERVED_KEYS.contains(&key.as_str()) {
            // Never let a tag clobber an identity-critical field.
            tracing::warn!(tag = %key, "tag collides with a built-in field, namespacing");
            tags.insert(format!("tag_{key}"), value.clone());
        } else {
            tags.insert(key.clone(), value.clone());
        }
    }

    Ok(Feature {
        id: record.unique_id,
        name: record.read_name.clone(),
        start,
        end,
        strand,
        mapping_quality: record.mapping_quality,
        flags: format!("0x{:x}", record.flags),
        cram_flags: format!("0x{:x}", record.cram_flags),
        qual,
        seq: record.read_bases.clone(),
        read_features: record.read_features.clone(),
        qc_failed: record.qc_failed,
        secondary_alignment: record.secondary,
        supplementary_alignment: record.supplementary,
        multi_segment_template: record.paired,
        multi_segment_all_correctly_aligned: record.properly_paired,
        multi_segment_next_segment_unmapped: record.mate_unmapped,
        unmapped: record.unmapped,
        next_seq_id,
        next_segment_position,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refseq::StaticReferenceContext;
    use crate::types::Mate;

    fn context() -> StaticReferenceContext {
        StaticReferenceContext::new(vec!["chr1".to_string(), "chr2".to_string()])
    }

    fn record() -> RawRecord {
        RawRecord {
            unique_id: 7,
            read_name: "read/1".to_string(),
            alignment_start: 1000,
            length_on_ref: 50,
            mapping_quality: 37,
            flags: 0x63,
            cram_flags: 0x3,
            read_bases: "ACGT".to_string(),
            quality_scores: vec![30, 31, 32, 33],
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_coordinates_and_length_invariant() {
        let feature = materialize(&record(), &context()).unwrap();
        assert_eq!(feature.start, 999);
        assert_eq!(feature.end, 1049);
        assert_eq!(feature.end - feature.start, 50);
    }

    #[test]
    fn test_unplaced_record_fails_loudly() {
        let mut r = record();
        r.alignment_start = 0;
        assert!(matches!(
            materialize(&r, &context()),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_strand_from_reverse_complement_predicate() {
        let mut r = record();
        assert_eq!(materialize(&r, &context()).unwrap().strand, Strand::Forward);
        r.reverse_complemented = true;
        assert_eq!(materialize(&r, &context()).unwrap().strand, Strand::Reverse);
    }

    #[test]
    fn test_quality_round_trip() {
        let feature = materialize(&record(), &context()).unwrap();
        assert_eq!(feature.qual, "63 64 65 66");

        let decoded: Vec<u8> = feature
            .qual
            .split(' ')
            .map(|s| (s.parse::<u16>().unwrap() - 33) as u8)
            .collect();
        assert_eq!(decoded, record().quality_scores);
    }

    #[test]
    fn test_extreme_scores_are_not_clamped() {
        let mut r = record();
        r.quality_scores = vec![0, 93, 250];
        let feature = materialize(&r, &context()).unwrap();
        assert_eq!(feature.qual, "33 126 283");
    }

    #[test]
    fn test_empty_quality_is_empty_string() {
        let mut r = record();
        r.quality_scores.clear();
        assert_eq!(materialize(&r, &context()).unwrap().qual, "");
    }

    #[test]
    fn test_flags_are_lowercase_hex() {
        let feature = materialize(&record(), &context()).unwrap();
        assert_eq!(feature.flags, "0x63");
        assert_eq!(feature.cram_flags, "0x3");
    }

    #[test]
    fn test_mate_locus_resolution() {
        let mut r = record();
        r.mate = Some(Mate {
            reference_id: 1,
            alignment_start: 5000,
        });
        let feature = materialize(&r, &context()).unwrap();
        assert_eq!(feature.next_seq_id.as_deref(), Some("chr2"));
        assert_eq!(feature.next_segment_position.as_deref(), Some("chr2:5000"));
    }

    #[test]
    fn test_unresolvable_mate_is_omitted_not_an_error() {
        let mut r = record();
        r.mate = Some(Mate {
            reference_id: 42,
            alignment_start: 5000,
        });
        let feature = materialize(&r, &context()).unwrap();
        assert_eq!(feature.next_seq_id, None);
        assert_eq!(feature.next_segment_position, None);
    }

    #[test]
    fn test_tag_collision_is_namespaced() {
        let mut r = record();
        r.tags.insert("start".to_string(), "999999".to_string());
        r.tags.insert("NM".to_string(), "2".to_string());

        let feature = materialize(&r, &context()).unwrap();
        assert_eq!(feature.start, 999);
        assert_eq!(feature.tags.get("tag_start").map(String::as_str), Some("999999"));
        assert_eq!(feature.tags.get("NM").map(String::as_str), Some("2"));
        assert!(!feature.tags.contains_key("start"));
    }
}
