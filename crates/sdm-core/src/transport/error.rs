//! Transport error type.

/// Failure of a probe or ranged GET.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection, DNS, TLS or timeout failure reported by libcurl.
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Status(u32),
    #[error("response carried no Content-Length")]
    MissingLength,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Curl(e) if e.is_operation_timedout())
    }
}
