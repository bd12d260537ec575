//! The alignment store façade.
//!
//! A [`CramStore`] composes a data byte source, a CRAI index, a container
//! decoder, and a reference context into a queryable store. Construction is
//! synchronous and validates configuration; index loading and global stats
//! estimation run in a background task gated by two one-shot readiness
//! signals that every query entry point awaits.

use crate::decode::ContainerDecoder;
use crate::index::CraiIndex;
use crate::query::{FeatureStream, RangeQueryEngine};
use crate::readiness::Signal;
use crate::refseq::{ReferenceContext, ReferenceResolver};
use crate::storage::{ByteSource, LocalByteSource};
use crate::types::{GlobalStats, Interval, Region, StoreDescriptor};
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Default bound on the initial readiness phase.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(3000);

enum SourceDescriptor {
    Inline(Arc<dyn ByteSource>),
    Path(PathBuf),
    #[cfg(feature = "http")]
    Url(String),
}

impl SourceDescriptor {
    fn url(&self) -> Option<String> {
        match self {
            SourceDescriptor::Inline(_) => None,
            SourceDescriptor::Path(path) => Some(path.display().to_string()),
            #[cfg(feature = "http")]
            SourceDescriptor::Url(url) => Some(url.clone()),
        }
    }

    fn into_source(self) -> Result<Arc<dyn ByteSource>> {
        match self {
            SourceDescriptor::Inline(source) => Ok(source),
            SourceDescriptor::Path(path) => Ok(Arc::new(LocalByteSource::new(path))),
            #[cfg(feature = "http")]
            SourceDescriptor::Url(url) => {
                Ok(Arc::new(crate::storage::HttpByteSource::new(&url)?))
            }
        }
    }
}

#[derive(Default)]
pub struct CramStoreBuilder {
    data: Option<SourceDescriptor>,
    index: Option<SourceDescriptor>,
    decoder: Option<Arc<dyn ContainerDecoder>>,
    context: Option<Arc<dyn ReferenceContext>>,
    store_timeout: Option<Duration>,
}

impl CramStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.data = Some(SourceDescriptor::Inline(source));
        self
    }

    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data = Some(SourceDescriptor::Path(path.into()));
        self
    }

    #[cfg(feature = "http")]
    pub fn data_url(mut self, url: impl Into<String>) -> Self {
        self.data = Some(SourceDescriptor::Url(url.into()));
        self
    }

    pub fn index_source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.index = Some(SourceDescriptor::Inline(source));
        self
    }

    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index = Some(SourceDescriptor::Path(path.into()));
        self
    }

    #[cfg(feature = "http")]
    pub fn index_url(mut self, url: impl Into<String>) -> Self {
        self.index = Some(SourceDescriptor::Url(url.into()));
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn ContainerDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn reference_context(mut self, context: Arc<dyn ReferenceContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Bound the initial readiness phase; per-query reads are not affected.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    /// Validate configuration, spawn initialization, and return the store.
    ///
    /// Must be called within a tokio runtime. Configuration errors are raised
    /// here synchronously; I/O problems surface later through the readiness
    /// signals.
    pub fn build(self) -> Result<CramStore> {
        let data_descriptor = self.data.ok_or_else(|| {
            Error::Configuration("must provide either an inline data source or a data url".into())
        })?;
        let index_descriptor = self.index.ok_or_else(|| {
            Error::Configuration("no index provided; a CRAM index is required".into())
        })?;
        let decoder = self
            .decoder
            .ok_or_else(|| Error::Configuration("a container decoder is required".into()))?;
        let context = self
            .context
            .ok_or_else(|| Error::Configuration("a reference context is required".into()))?;

        let descriptor = StoreDescriptor {
            url: data_descriptor.url(),
            index_url: index_descriptor.url(),
        };
        let source_name = descriptor.url.as_deref().and_then(source_name_from_url);

        let data = data_descriptor.into_source()?;
        let index_source = index_descriptor.into_source()?;

        let features_ready = Arc::new(Signal::new());
        let stats_ready = Arc::new(Signal::new());
        let engine: Arc<OnceCell<Arc<RangeQueryEngine>>> = Arc::new(OnceCell::new());
        let stats: Arc<OnceCell<GlobalStats>> = Arc::new(OnceCell::new());

        {
            let context = context.clone();
            let engine = engine.clone();
            let stats = stats.clone();
            let features_ready = features_ready.clone();
            let stats_ready = stats_ready.clone();
            tokio::spawn(async move {
                if let Err(e) = initialize(
                    data,
                    index_source,
                    decoder,
                    context,
                    &engine,
                    &stats,
                    &features_ready,
                    &stats_ready,
                )
                .await
                {
                    tracing::warn!(error = %e, "store initialization failed");
                    // Rejecting an already-resolved signal is a no-op, so a
                    // late stats failure leaves features available.
                    let shared = Arc::new(e);
                    features_ready.reject(shared.clone());
                    stats_ready.reject(shared);
                }
            });
        }

        Ok(CramStore {
            context,
            engine,
            stats,
            features_ready,
            stats_ready,
            store_timeout: self.store_timeout.unwrap_or(DEFAULT_STORE_TIMEOUT),
            descriptor,
            source_name,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn initialize(
    data: Arc<dyn ByteSource>,
    index_source: Arc<dyn ByteSource>,
    decoder: Arc<dyn ContainerDecoder>,
    context: Arc<dyn ReferenceContext>,
    engine_cell: &OnceCell<Arc<RangeQueryEngine>>,
    stats_cell: &OnceCell<GlobalStats>,
    features_ready: &Signal,
    stats_ready: &Signal,
) -> Result<()> {
    // Fetch the whole index up front so stats estimation does not run
    // against a partially-loaded index.
    let index = Arc::new(CraiIndex::load(index_source.as_ref()).await?);
    let resolver = Arc::new(ReferenceResolver::new(context));
    let engine = Arc::new(RangeQueryEngine::new(data, index, decoder, resolver));

    let _ = engine_cell.set(engine.clone());
    features_ready.resolve();

    let stats = engine.estimate_global_stats().await?;
    let _ = stats_cell.set(stats);
    stats_ready.resolve();
    Ok(())
}

pub struct CramStore {
    context: Arc<dyn ReferenceContext>,
    engine: Arc<OnceCell<Arc<RangeQueryEngine>>>,
    stats: Arc<OnceCell<GlobalStats>>,
    features_ready: Arc<Signal>,
    stats_ready: Arc<Signal>,
    store_timeout: Duration,
    descriptor: StoreDescriptor,
    source_name: Option<String>,
}

impl std::fmt::Debug for CramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CramStore")
            .field("descriptor", &self.descriptor)
            .field("source_name", &self.source_name)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl CramStore {
    pub fn builder() -> CramStoreBuilder {
        CramStoreBuilder::new()
    }

    /// Query features overlapping a region given in 1-based closed
    /// coordinates; the interbase translation happens here, on entry.
    ///
    /// An unknown reference name yields an empty stream immediately, with no
    /// error. Known references await index readiness first.
    pub async fn get_features(&self, region: &Region) -> Result<FeatureStream> {
        let interval = Interval::from_one_based(region.start, region.end)?;

        let name = self.context.regularize_reference_name(&region.reference_name);
        let Some(reference_id) = self.context.resolve_reference_id(&name) else {
            tracing::debug!(reference = %region.reference_name, "unknown reference name");
            return Ok(FeatureStream::empty());
        };

        let engine = self.engine_ready().await?;
        Ok(engine.query_features(reference_id, interval))
    }

    /// Whether the store has data for the named reference.
    ///
    /// An unresolvable name reports `false` without touching the index;
    /// otherwise the answer awaits index readiness and is stable thereafter.
    pub async fn has_reference(&self, name: &str) -> Result<bool> {
        let name = self.context.regularize_reference_name(name);
        let Some(reference_id) = self.context.resolve_reference_id(&name) else {
            return Ok(false);
        };

        let engine = self.engine_ready().await?;
        Ok(engine.index().has_data_for_reference(reference_id))
    }

    /// The memoized global feature-density estimate.
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        self.await_ready(&self.stats_ready).await?;
        self.stats
            .get()
            .copied()
            .ok_or_else(|| Error::Internal("stats resolved without a value".into()))
    }

    /// Minimal serializable state sufficient to reconstruct the store.
    pub fn descriptor(&self) -> &StoreDescriptor {
        &self.descriptor
    }

    /// Display name derived from the data URL's last path segment.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    async fn engine_ready(&self) -> Result<Arc<RangeQueryEngine>> {
        self.await_ready(&self.features_ready).await?;
        self.engine
            .get()
            .cloned()
            .ok_or_else(|| Error::Internal("readiness resolved without an engine".into()))
    }

    async fn await_ready(&self, signal: &Signal) -> Result<()> {
        tokio::time::timeout(self.store_timeout, signal.wait())
            .await
            .map_err(|_| Error::Timeout(self.store_timeout))?
    }
}

fn source_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['#', '?']).next()?;
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refseq::StaticReferenceContext;
    use crate::storage::MemoryByteSource;
    use crate::types::RawRecord;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct NullDecoder;

    #[async_trait]
    impl ContainerDecoder for NullDecoder {
        async fn decode(
            &self,
            _bytes: Bytes,
            _reference: &ReferenceResolver,
        ) -> Result<Vec<RawRecord>> {
            Ok(Vec::new())
        }
    }

    fn context() -> Arc<dyn ReferenceContext> {
        Arc::new(StaticReferenceContext::new(vec!["chr1".to_string()]))
    }

    #[tokio::test]
    async fn test_missing_index_is_a_configuration_error() {
        let err = CramStore::builder()
            .data_source(Arc::new(MemoryByteSource::new(&b""[..])))
            .decoder(Arc::new(NullDecoder))
            .reference_context(context())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_missing_data_is_a_configuration_error() {
        let err = CramStore::builder()
            .index_source(Arc::new(MemoryByteSource::new(&b""[..])))
            .decoder(Arc::new(NullDecoder))
            .reference_context(context())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_source_name_from_url() {
        assert_eq!(
            source_name_from_url("http://example.com/runs/sample1.cram?token=abc").as_deref(),
            Some("sample1.cram")
        );
        assert_eq!(
            source_name_from_url("/data/sample2.cram").as_deref(),
            Some("sample2.cram")
        );
        assert_eq!(source_name_from_url(""), None);
    }

    #[tokio::test]
    async fn test_descriptor_exposes_only_urls() {
        let store = CramStore::builder()
            .data_path("/data/sample.cram")
            .index_path("/data/sample.cram.crai")
            .decoder(Arc::new(NullDecoder))
            .reference_context(context())
            .build()
            .unwrap();

        let descriptor = store.descriptor();
        assert_eq!(descriptor.url.as_deref(), Some("/data/sample.cram"));
        assert_eq!(
            descriptor.index_url.as_deref(),
            Some("/data/sample.cram.crai")
        );
        assert_eq!(store.source_name(), Some("sample.cram"));
        assert!(format!("{store:?}").contains("CramStore"));
    }
}
