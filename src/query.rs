//! Indexed range queries.
//!
//! The engine orchestrates index lookup, positional byte-range reads,
//! container decoding, per-record overlap filtering, and materialization,
//! yielding features lazily one container span at a time.

use crate::decode::ContainerDecoder;
use crate::index::{AlignmentIndex, ByteSpan};
use crate::materialize::materialize;
use crate::refseq::ReferenceResolver;
use crate::storage::ByteSource;
use crate::types::{Feature, GlobalStats, Interval};
use crate::Result;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct RangeQueryEngine {
    source: Arc<dyn ByteSource>,
    index: Arc<dyn AlignmentIndex>,
    decoder: Arc<dyn ContainerDecoder>,
    reference: Arc<ReferenceResolver>,
}

impl RangeQueryEngine {
    pub fn new(
        source: Arc<dyn ByteSource>,
        index: Arc<dyn AlignmentIndex>,
        decoder: Arc<dyn ContainerDecoder>,
        reference: Arc<ReferenceResolver>,
    ) -> Self {
        Self {
            source,
            index,
            decoder,
            reference,
        }
    }

    pub fn index(&self) -> &dyn AlignmentIndex {
        self.index.as_ref()
    }

    /// Plan and start a range query. A reference the index holds no data for
    /// yields an empty stream, not an error.
    pub fn query_features(&self, reference_id: usize, interval: Interval) -> FeatureStream {
        if !self.index.has_data_for_reference(reference_id) {
            tracing::debug!(reference_id, "no data for reference");
            return FeatureStream::empty();
        }

        let spans = self.index.spans_for_range(reference_id, interval);
        tracing::debug!(
            reference_id,
            start = interval.start,
            end = interval.end,
            spans = spans.len(),
            "planned range query"
        );

        FeatureStream {
            inner: Some(StreamInner {
                source: self.source.clone(),
                decoder: self.decoder.clone(),
                reference: self.reference.clone(),
                interval,
                spans: spans.into(),
                pending: VecDeque::new(),
            }),
        }
    }

    /// One-time feature density estimate: sample expanding windows from the
    /// start of the first reference with data until enough features are seen.
    pub async fn estimate_global_stats(&self) -> Result<GlobalStats> {
        const WINDOWS: [u64; 4] = [1_000, 10_000, 100_000, 1_000_000];
        const ENOUGH: u64 = 300;

        let Some(reference_id) = self.index.reference_ids().into_iter().next() else {
            return Ok(GlobalStats {
                feature_density: 0.0,
                feature_count: 0,
                sampled_span: 0,
            });
        };

        let mut count = 0;
        let mut span = WINDOWS[0];
        for window in WINDOWS {
            span = window;
            count = 0;
            let mut stream = self.query_features(reference_id, Interval { start: 0, end: window });
            while let Some(item) = stream.next().await {
                item?;
                count += 1;
            }
            if count >= ENOUGH {
                break;
            }
        }

        let stats = GlobalStats {
            feature_density: count as f64 / span as f64,
            feature_count: count,
            sampled_span: span,
        };
        tracing::debug!(
            reference_id,
            density = stats.feature_density,
            count = stats.feature_count,
            "estimated global stats"
        );
        Ok(stats)
    }
}

struct StreamInner {
    source: Arc<dyn ByteSource>,
    decoder: Arc<dyn ContainerDecoder>,
    reference: Arc<ReferenceResolver>,
    interval: Interval,
    spans: VecDeque<ByteSpan>,
    pending: VecDeque<Feature>,
}

/// Lazy, finite, non-restartable sequence of features.
///
/// `next` returning `None` is clean end-of-sequence; `Some(Err(_))` is fatal
/// for the query, after which the stream is fused and only yields `None`.
/// Features are delivered in container-decode order, not globally sorted by
/// coordinate.
pub struct FeatureStream {
    inner: Option<StreamInner>,
}

impl std::fmt::Debug for FeatureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("FeatureStream");
        match &self.inner {
            Some(inner) => s
                .field("interval", &inner.interval)
                .field("spans_remaining", &inner.spans.len())
                .field("pending", &inner.pending.len())
                .finish_non_exhaustive(),
            None => s.field("terminated", &true).finish_non_exhaustive(),
        }
    }
}

impl FeatureStream {
    /// A stream that ends immediately with zero features.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub async fn next(&mut self) -> Option<Result<Feature>> {
        loop {
            let inner = self.inner.as_mut()?;
            if let Some(feature) = inner.pending.pop_front() {
                return Some(Ok(feature));
            }
            let Some(span) = inner.spans.pop_front() else {
                self.inner = None;
                return None;
            };
            if let Err(e) = inner.load_span(span).await {
                self.inner = None;
                return Some(Err(e));
            }
        }
    }

    /// Drain the remainder of the stream into a vector.
    pub async fn collect(mut self) -> Result<Vec<Feature>> {
        let mut features = Vec::new();
        while let Some(item) = self.next().await {
            features.push(item?);
        }
        Ok(features)
    }
}

impl StreamInner {
    async fn load_span(&mut self, span: ByteSpan) -> Result<()> {
        let bytes = self.source.read(span.offset, span.length).await?;
        let records = self.decoder.decode(bytes, &self.reference).await?;

        for record in records {
            // The span may be wider than the query; keep only true overlaps.
            if !record.reference_interval().intersects(&self.interval) {
                continue;
            }
            let feature = materialize(&record, self.reference.context())?;
            self.pending.push_back(feature);
        }
        Ok(())
    }
}
