use super::{ByteSource, SourceInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// In-memory byte source for inline data handles and tests.
pub struct MemoryByteSource {
    bytes: Bytes,
    name: Option<String>,
}

impl MemoryByteSource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            name: None,
        }
    }

    pub fn with_name(bytes: impl Into<Bytes>, name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            name: Some(name.into()),
        }
    }
}

#[async_trait]
impl ByteSource for MemoryByteSource {
    async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        let size = self.bytes.len() as u64;
        if offset >= size {
            return Err(Error::InvalidRange(format!(
                "read at offset {offset} past end of in-memory source ({size} bytes)"
            )));
        }
        let end = offset.saturating_add(length).min(size);
        Ok(self.bytes.slice(offset as usize..end as usize))
    }

    async fn read_all(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }

    async fn stat(&self) -> Result<SourceInfo> {
        Ok(SourceInfo {
            size: self.bytes.len() as u64,
            url: self.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slice_semantics() {
        let source = MemoryByteSource::new(&b"container bytes"[..]);
        assert_eq!(&source.read(0, 9).await.unwrap()[..], b"container");
        assert_eq!(&source.read(10, 100).await.unwrap()[..], b"bytes");
        assert!(source.read(15, 1).await.is_err());
    }
}
