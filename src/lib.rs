//! Indexed range-query engine for CRAM-style alignment stores.
//!
//! Given a reference id and a coordinate interval, the engine locates the
//! compressed containers covering the interval via a CRAI index, reads only
//! those byte spans from a [`storage::ByteSource`], hands them to an opaque
//! [`decode::ContainerDecoder`], filters the decoded records by true
//! overlap, and materializes each survivor into an immutable
//! [`types::Feature`]. Records whose encoding needs the underlying
//! reference bases consult a [`refseq::ReferenceResolver`].
//!
//! External query APIs speak 1-based closed coordinates; everything internal
//! is 0-based half-open interbase, translated exactly once at the boundary.

pub mod decode;
pub mod error;
pub mod index;
pub mod materialize;
pub mod query;
pub mod readiness;
pub mod refseq;
pub mod storage;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::{CramStore, CramStoreBuilder};
