//! Byte-range sources for alignment data and index files.
//!
//! A [`ByteSource`] is an addressable byte store supporting positional reads
//! and whole-file fetch, abstracting over local files, in-memory blobs, and
//! network-fetched data. Sources are read-only after construction and must
//! support concurrent outstanding reads; a query may issue several in flight.

mod local;
mod memory;

pub use local::LocalByteSource;
pub use memory::MemoryByteSource;

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::HttpByteSource;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Metadata about a byte source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub size: u64,
    pub url: Option<String>,
}

/// An addressable, shareable byte store.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Positional read of up to `length` bytes starting at `offset`. A read
    /// that begins past the end of the source is an error; one that merely
    /// extends past it is truncated.
    async fn read(&self, offset: u64, length: u64) -> Result<Bytes>;

    /// Fetch the entire source.
    async fn read_all(&self) -> Result<Bytes>;

    /// Size and location metadata.
    async fn stat(&self) -> Result<SourceInfo>;
}
