//! HTTP transport to the processing service
//!
//! Request/response plus chunked response streaming, narrowed to what the
//! workflow needs: one body POST with an explicit declared length, and a
//! GET whose body is consumed incrementally during playback.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::{Error, Result};

/// Response to a body POST: status plus the service's immediate text body
#[derive(Debug)]
pub struct TextResponse {
    pub status: u16,
    pub body: String,
}

/// Response to a streaming GET
pub struct StreamResponse {
    pub status: u16,
    /// Declared content length, if the service sent one
    pub declared_len: Option<u64>,
    pub stream: Box<dyn ByteStream>,
}

/// Incrementally consumed response body
#[async_trait(?Send)]
pub trait ByteStream {
    /// Next chunk of the body; `None` once the stream ends or the peer
    /// disconnects.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// HTTP-style request/response primitives
#[async_trait(?Send)]
pub trait Transport {
    /// POST `body` with the given content type and declared length
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        content_length: u64,
        timeout: Duration,
    ) -> Result<TextResponse>;

    /// GET returning the status, declared length, and body stream
    async fn get(&self, url: &str) -> Result<StreamResponse>;
}

/// reqwest-backed production transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the transport with a bounded connect timeout
    ///
    /// # Errors
    ///
    /// Returns error if the client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        content_length: u64,
        timeout: Duration,
    ) -> Result<TextResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TextResponse { status, body })
    }

    async fn get(&self, url: &str) -> Result<StreamResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let declared_len = response.content_length();
        let stream = Box::new(ReqwestStream {
            inner: response.bytes_stream().boxed(),
        });
        Ok(StreamResponse {
            status,
            declared_len,
            stream,
        })
    }
}

struct ReqwestStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
}

#[async_trait(?Send)]
impl ByteStream for ReqwestStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.inner.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(Error::from(e)),
            None => Ok(None),
        }
    }
}

/// Collect a body stream into text, bounded by `limit` bytes
///
/// # Errors
///
/// Returns error if the stream fails mid-body.
pub async fn read_to_string(stream: &mut dyn ByteStream, limit: usize) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next_chunk().await? {
        buf.extend_from_slice(&chunk);
        if buf.len() >= limit {
            buf.truncate(limit);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
