use super::{ByteSource, SourceInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Local filesystem byte source.
///
/// Opens the file per read so that `&self` reads can run concurrently
/// without a shared seek position.
pub struct LocalByteSource {
    path: PathBuf,
}

impl LocalByteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn open(&self) -> Result<fs::File> {
        fs::File::open(&self.path)
            .await
            .map_err(|_| Error::NotFound(self.path.display().to_string()))
    }
}

#[async_trait]
impl ByteSource for LocalByteSource {
    async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut file = self.open().await?;
        let size = file.metadata().await?.len();

        if offset >= size {
            return Err(Error::InvalidRange(format!(
                "read at offset {} past end of {} ({} bytes)",
                offset,
                self.path.display(),
                size
            )));
        }

        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let len = length.min(size - offset) as usize;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn read_all(&self) -> Result<Bytes> {
        let mut file = self.open().await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn stat(&self) -> Result<SourceInfo> {
        let metadata = fs::metadata(&self.path)
            .await
            .map_err(|_| Error::NotFound(self.path.display().to_string()))?;
        Ok(SourceInfo {
            size: metadata.len(),
            url: Some(self.path.display().to_string()),
        })
    }
}
