//! HTTP/HTTPS byte source.
//!
//! Positional reads are issued as HTTP Range requests, so queries against a
//! remote alignment file fetch only the containers they need.

use super::{ByteSource, SourceInfo};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use url::Url;

/// HTTP/HTTPS byte source backed by Range requests.
pub struct HttpByteSource {
    client: Client,
    url: Url,
}

impl HttpByteSource {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::Configuration(format!("invalid source url {url}: {e}")))?;
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn get(&self, range: Option<(u64, u64)>) -> Result<Bytes> {
        let mut request = self.client.get(self.url.clone());
        if let Some((start, end)) = range {
            request = request.header(reqwest::header::RANGE, format!("bytes={start}-{end}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP GET request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::NotFound(self.url.to_string()));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::Internal(format!("failed to read HTTP response: {e}")))
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        // Range header is inclusive on both ends.
        self.get(Some((offset, offset + length - 1))).await
    }

    async fn read_all(&self) -> Result<Bytes> {
        self.get(None).await
    }

    async fn stat(&self) -> Result<SourceInfo> {
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP HEAD request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::NotFound(self.url.to_string()));
        }

        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Internal("missing Content-Length header".to_string()))?;

        Ok(SourceInfo {
            size,
            url: Some(self.url.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        assert!(matches!(
            HttpByteSource::new("not a url"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_accepts_https_url() {
        let source = HttpByteSource::new("https://example.com/data.cram").unwrap();
        assert_eq!(source.url().path(), "/data.cram");
    }
}
