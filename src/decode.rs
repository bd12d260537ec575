//! Container decoder boundary.
//!
//! The byte-level container format is an external collaborator: given the
//! bytes of one or more containers, a decoder yields raw alignment records.
//! Decoding is assumed deterministic and side-effect-free.

use crate::Result;
use crate::refseq::ReferenceResolver;
use crate::types::RawRecord;
use async_trait::async_trait;
use bytes::Bytes;

/// Decodes container bytes into raw alignment records.
///
/// The resolver is available for records whose encoding reconstructs read
/// bases against the reference sequence; decoders that never need it simply
/// ignore it. Failures surface as [`crate::Error::Decode`] and abort the
/// in-flight query without invalidating the store.
#[async_trait]
pub trait ContainerDecoder: Send + Sync {
    async fn decode(&self, bytes: Bytes, reference: &ReferenceResolver) -> Result<Vec<RawRecord>>;
}
