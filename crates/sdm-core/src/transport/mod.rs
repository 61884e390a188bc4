//! HTTP transport seam.
//!
//! The engine needs two things from the network: a metadata probe (status and
//! Content-Length of an unranged GET) and a ranged GET streamed in chunks.
//! `CurlTransport` implements both with libcurl; tests plug in their own.

mod curl_transport;
mod error;
mod parse;

pub use self::curl_transport::CurlTransport;
pub use self::error::TransportError;

/// Result of the metadata probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// HTTP status of the unranged GET.
    pub status: u32,
    /// Total size in bytes from `Content-Length`.
    pub content_length: u64,
    /// True if the server sent `Accept-Ranges: bytes`. Informational only.
    pub accept_ranges: bool,
}

/// Returned by a chunk consumer to continue or end the transfer early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFlow {
    Continue,
    Abort,
}

/// How a ranged fetch ended when no transport error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response body ended.
    Finished,
    /// The chunk consumer returned `ChunkFlow::Abort`.
    Aborted,
}

/// Blocking HTTP transport. Implementations must bound every call with connect
/// and read timeouts; callers run them on blocking threads.
pub trait Transport: Send + Sync + 'static {
    /// Unranged GET of `url`; reads the status line and headers, never the body.
    /// Fails unless the status is 200 and a Content-Length is present.
    fn probe(&self, url: &str) -> Result<ProbeResult, TransportError>;

    /// GET `url` with `Range: bytes=start-(end-1)` and hand each body chunk to
    /// `on_chunk` in order. Chunks are only delivered for 206 Partial Content, or
    /// 200 when `start` is 0; any other status fails with
    /// `TransportError::Status` before a single body byte is delivered.
    fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkFlow,
    ) -> Result<FetchOutcome, TransportError>;
}

/// Whether a ranged response with `status` may be written starting at `start`.
pub fn range_status_acceptable(status: u32, start: u64) -> bool {
    status == 206 || (status == 200 && start == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_content_always_acceptable() {
        assert!(range_status_acceptable(206, 0));
        assert!(range_status_acceptable(206, 4096));
    }

    #[test]
    fn full_body_only_acceptable_from_zero() {
        assert!(range_status_acceptable(200, 0));
        assert!(!range_status_acceptable(200, 1));
        assert!(!range_status_acceptable(416, 0));
        assert!(!range_status_acceptable(503, 0));
    }
}
