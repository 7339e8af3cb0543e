//! Transfer backends for the chunked downloader.
//!
//! [`ChunkSource`] is the seam between the download orchestration (chunk
//! planning, worker pool, merge) and the wire. [`HttpSource`] is the real
//! implementation on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::chunk::ByteRangeChunk;
use crate::error::{Error, Result};

/// Connection establishment timeout for the default client.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// What the probe learned about a remote resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeSupport {
    /// The server advertised `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
    /// Size of the resource, when reported.
    pub content_length: Option<u64>,
}

/// Destination for streamed bytes.
pub type ByteSink<'a> = dyn AsyncWrite + Unpin + Send + 'a;

/// Callback invoked with the size of every block written to a sink.
pub type OnBytes<'a> = dyn Fn(u64) + Send + Sync + 'a;

/// A place bytes can be fetched from, whole or by range.
///
/// Implementations must stream into the sink rather than buffer whole bodies.
/// Write failures on the sink are reported as [`Error::Io`].
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Asks the server whether it serves byte ranges and how large the
    /// resource is.
    async fn probe(&self, url: &str) -> Result<RangeSupport>;

    /// Streams one byte range into `sink`, returning the number of bytes
    /// written.
    async fn fetch_range(
        &self,
        url: &str,
        chunk: ByteRangeChunk,
        sink: &mut ByteSink<'_>,
        on_bytes: &OnBytes<'_>,
    ) -> Result<u64>;

    /// Streams the full body into `sink`, returning the number of bytes
    /// written.
    async fn fetch_all(&self, url: &str, sink: &mut ByteSink<'_>, on_bytes: &OnBytes<'_>)
    -> Result<u64>;
}

/// [`ChunkSource`] backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Creates a source with the default client (see [`http_client`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(http_client()?))
    }

    /// Creates a source that reuses an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Builds the HTTP client shared by downloads, signature fetches and release
/// lookups.
///
/// No overall request timeout is set; download deadlines are enforced by the
/// downloader so that chunk temp files are cleaned up.
///
/// # Errors
///
/// Returns an error if the client cannot be constructed.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("dropkit/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::http("<client>", e))
}

#[async_trait]
impl ChunkSource for HttpSource {
    async fn probe(&self, url: &str) -> Result<RangeSupport> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;

        // Some servers reject HEAD outright; treat that as "no range support"
        // and let the single fetch report any real error.
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "HEAD probe rejected");
            return Ok(RangeSupport::default());
        }

        let headers = response.headers();
        let accepts_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")));
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        debug!(url, accepts_ranges, ?content_length, "Probed remote resource");
        Ok(RangeSupport {
            accepts_ranges,
            content_length,
        })
    }

    async fn fetch_range(
        &self,
        url: &str,
        chunk: ByteRangeChunk,
        sink: &mut ByteSink<'_>,
        on_bytes: &OnBytes<'_>,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .header(RANGE, chunk.range_header())
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(Error::ChunkStatus {
                url: url.to_string(),
                index: chunk.index,
                status: response.status().as_u16(),
            });
        }

        stream_body(url, response, sink, on_bytes).await
    }

    async fn fetch_all(
        &self,
        url: &str,
        sink: &mut ByteSink<'_>,
        on_bytes: &OnBytes<'_>,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;

        if !response.status().is_success() {
            return Err(Error::status(url, response.status().as_u16()));
        }

        stream_body(url, response, sink, on_bytes).await
    }
}

async fn stream_body(
    url: &str,
    response: reqwest::Response,
    sink: &mut ByteSink<'_>,
    on_bytes: &OnBytes<'_>,
) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(block) = stream.next().await {
        let block = block.map_err(|e| Error::http(url, e))?;
        sink.write_all(&block)
            .await
            .map_err(|e| Error::io(format!("Failed to write body of {url}"), e))?;
        written += block.len() as u64;
        on_bytes(block.len() as u64);
    }

    sink.flush()
        .await
        .map_err(|e| Error::io(format!("Failed to flush body of {url}"), e))?;

    Ok(written)
}
