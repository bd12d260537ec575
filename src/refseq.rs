//! Reference sequence resolution.
//!
//! CRAM-style encodings reconstruct read bases against the underlying
//! reference sequence, so the decoder occasionally needs a window of raw
//! bases. [`ReferenceResolver::fetch_bases`] retrieves that window from an
//! external reference store, reconciling possibly-unordered chunks into a
//! single contiguous string and failing loudly on any length mismatch.

use crate::types::Interval;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// A chunk of reference sequence, in interbase coordinates. Chunks may be
/// wider than requested and may arrive in any order.
#[derive(Debug, Clone)]
pub struct SeqChunk {
    pub start: u64,
    pub end: u64,
    pub seq: String,
}

/// External store of reference sequence bases, fetched by region.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn fetch_chunks(
        &self,
        reference_name: &str,
        interval: Interval,
    ) -> Result<Vec<SeqChunk>>;
}

/// Reference naming and lookup capabilities, passed explicitly at
/// construction instead of being read from ambient session state.
pub trait ReferenceContext: Send + Sync {
    fn resolve_reference_id(&self, name: &str) -> Option<usize>;

    fn resolve_reference_name(&self, reference_id: usize) -> Option<String>;

    /// Canonicalize an externally-supplied reference name before lookup.
    fn regularize_reference_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// The reference store, if one is configured. Absence degrades
    /// sequence-dependent fields rather than failing queries.
    fn reference_store(&self) -> Option<Arc<dyn ReferenceStore>>;
}

/// Fixed reference catalog; ids are positions in the name list.
pub struct StaticReferenceContext {
    names: Vec<String>,
    store: Option<Arc<dyn ReferenceStore>>,
}

impl StaticReferenceContext {
    pub fn new(names: Vec<String>) -> Self {
        Self { names, store: None }
    }

    pub fn with_store(names: Vec<String>, store: Arc<dyn ReferenceStore>) -> Self {
        Self {
            names,
            store: Some(store),
        }
    }
}

impl ReferenceContext for StaticReferenceContext {
    fn resolve_reference_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn resolve_reference_name(&self, reference_id: usize) -> Option<String> {
        self.names.get(reference_id).cloned()
    }

    fn reference_store(&self) -> Option<Arc<dyn ReferenceStore>> {
        self.store.clone()
    }
}

/// Fetches and reconciles reference bases for the container decoder.
pub struct ReferenceResolver {
    context: Arc<dyn ReferenceContext>,
}

impl ReferenceResolver {
    pub fn new(context: Arc<dyn ReferenceContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &dyn ReferenceContext {
        self.context.as_ref()
    }

    /// Fetch reference bases for `[start, end]`, `start` 1-based closed.
    ///
    /// Returns `Ok(None)` when no reference store is configured or the
    /// reference id does not resolve to a name; sequence-dependent record
    /// fields then become unavailable, which is not a fault.
    ///
    /// Postcondition: the returned string's length equals the requested span
    /// exactly; any shortfall is an [`Error::Reconciliation`]. A silently
    /// short sequence would corrupt every downstream base call.
    pub async fn fetch_bases(
        &self,
        reference_id: usize,
        start: u64,
        end: u64,
    ) -> Result<Option<String>> {
        let interval = Interval::from_one_based(start, end)?;

        let Some(store) = self.context.reference_store() else {
            return Ok(None);
        };
        let Some(name) = self.context.resolve_reference_name(reference_id) else {
            return Ok(None);
        };

        let mut chunks = store.fetch_chunks(&name, interval).await?;

        // Chunks may arrive unordered; concatenation order matters.
        chunks.sort_by_key(|c| c.start);

        let mut sequence = String::with_capacity(interval.len() as usize);
        for chunk in &chunks {
            if chunk.end <= interval.start || chunk.start >= interval.end {
                continue;
            }
            let trim_start = interval.start.saturating_sub(chunk.start) as usize;
            let trim_end = (interval.end.min(chunk.end) - chunk.start) as usize;
            let trim_end = trim_end.min(chunk.seq.len());
            if trim_start >= trim_end {
                continue;
            }
            sequence.push_str(&chunk.seq[trim_start..trim_end]);
        }

        if sequence.len() as u64 != interval.len() {
            return Err(Error::Reconciliation(format!(
                "reconstructed {} bases for a {}-base window of {}",
                sequence.len(),
                interval.len(),
                name
            )));
        }

        Ok(Some(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedChunks(Vec<SeqChunk>);

    #[async_trait]
    impl ReferenceStore for FixedChunks {
        async fn fetch_chunks(&self, _name: &str, _interval: Interval) -> Result<Vec<SeqChunk>> {
            Ok(self.0.clone())
        }
    }

    fn resolver(chunks: Vec<SeqChunk>) -> ReferenceResolver {
        let context = StaticReferenceContext::with_store(
            vec!["chr1".to_string()],
            Arc::new(FixedChunks(chunks)),
        );
        ReferenceResolver::new(Arc::new(context))
    }

    fn chunk(start: u64, seq: &str) -> SeqChunk {
        SeqChunk {
            start,
            end: start + seq.len() as u64,
            seq: seq.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unordered_chunks_concatenate_sorted() {
        // Window [10, 20) covered by two chunks delivered out of order.
        let r = resolver(vec![chunk(15, "GGGGG"), chunk(10, "ACGTA")]);
        let bases = r.fetch_bases(0, 11, 20).await.unwrap();
        assert_eq!(bases.as_deref(), Some("ACGTAGGGGG"));

        // Pre-sorted delivery must produce the identical result.
        let r = resolver(vec![chunk(10, "ACGTA"), chunk(15, "GGGGG")]);
        assert_eq!(r.fetch_bases(0, 11, 20).await.unwrap(), bases);
    }

    #[tokio::test]
    async fn test_chunks_wider_than_window_are_trimmed() {
        let r = resolver(vec![chunk(0, "NNNNNACGTACGTACGTNNN")]);
        let bases = r.fetch_bases(0, 6, 9).await.unwrap();
        assert_eq!(bases.as_deref(), Some("ACGT"));
    }

    #[tokio::test]
    async fn test_short_chunk_set_is_a_reconciliation_error() {
        // One chunk missing: [10, 15) present, [15, 20) absent.
        let r = resolver(vec![chunk(10, "ACGTA")]);
        let err = r.fetch_bases(0, 11, 20).await.unwrap_err();
        assert!(matches!(err, Error::Reconciliation(_)));
    }

    #[tokio::test]
    async fn test_chunk_shorter_than_declared_fails_loudly() {
        let r = resolver(vec![SeqChunk {
            start: 10,
            end: 20,
            seq: "ACG".to_string(),
        }]);
        assert!(matches!(
            r.fetch_bases(0, 11, 20).await.unwrap_err(),
            Error::Reconciliation(_)
        ));
    }

    #[tokio::test]
    async fn test_absent_store_degrades_to_none() {
        let context = StaticReferenceContext::new(vec!["chr1".to_string()]);
        let r = ReferenceResolver::new(Arc::new(context));
        assert_eq!(r.fetch_bases(0, 11, 20).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unresolvable_reference_degrades_to_none() {
        let r = resolver(vec![chunk(10, "ACGTAGGGGG")]);
        assert_eq!(r.fetch_bases(99, 11, 20).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_start_is_rejected() {
        let r = resolver(vec![]);
        assert!(matches!(
            r.fetch_bases(0, 0, 20).await.unwrap_err(),
            Error::InvalidRange(_)
        ));
    }
}
