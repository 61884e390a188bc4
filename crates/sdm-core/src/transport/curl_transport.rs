//! libcurl-backed transport: one Easy handle per request.

use std::cell::Cell;
use std::str;
use std::time::Duration;

use crate::config::SdmConfig;

use super::parse::{parse_headers, parse_status_line};
use super::{
    range_status_acceptable, ChunkFlow, FetchOutcome, ProbeResult, Transport, TransportError,
};

/// Blocking HTTP(S) transport. Redirects are not followed.
#[derive(Debug, Clone, Copy)]
pub struct CurlTransport {
    connect_timeout: Duration,
    read_timeout: Duration,
    buffer_size: usize,
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, buffer_size: usize) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            buffer_size: buffer_size.max(1024),
        }
    }

    pub fn from_config(cfg: &SdmConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.read_timeout(), cfg.chunk_size_bytes)
    }

    fn easy(&self, url: &str) -> Result<curl::easy::Easy, TransportError> {
        url::Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(false)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Read timeout: abort when less than 1 byte/s arrives for `read_timeout`.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(self.read_timeout)?;
        easy.buffer_size(self.buffer_size)?;
        Ok(easy)
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::from_config(&SdmConfig::default())
    }
}

impl Transport for CurlTransport {
    fn probe(&self, url: &str) -> Result<ProbeResult, TransportError> {
        let mut easy = self.easy(url)?;
        let mut lines: Vec<String> = Vec::new();
        let mut body_refused = false;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })?;
            // Headers are all the probe needs; refusing the first body chunk ends the transfer.
            transfer.write_function(|_| {
                body_refused = true;
                Ok(0)
            })?;
            transfer.perform()
        };
        if let Err(e) = performed {
            if !(e.is_write_error() && body_refused) {
                return Err(e.into());
            }
        }

        let head = parse_headers(&lines);
        let status = match head.status {
            Some(s) => s,
            None => easy.response_code()?,
        };
        if status != 200 {
            return Err(TransportError::Status(status));
        }
        let content_length = head.content_length.ok_or(TransportError::MissingLength)?;
        tracing::debug!(url, status, content_length, "probe ok");

        Ok(ProbeResult {
            status,
            content_length,
            accept_ranges: head.accept_ranges,
        })
    }

    fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkFlow,
    ) -> Result<FetchOutcome, TransportError> {
        if start >= end {
            return Ok(FetchOutcome::Finished);
        }
        let mut easy = self.easy(url)?;
        // curl expects "start-end" (inclusive), not "bytes=start-end".
        easy.range(&format!("{}-{}", start, end - 1))?;

        let status: Cell<Option<u32>> = Cell::new(None);
        let mut rejected: Option<u32> = None;
        let mut aborted = false;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Some(code) = str::from_utf8(data).ok().and_then(parse_status_line) {
                    status.set(Some(code));
                }
                true
            })?;
            transfer.write_function(|data| {
                let code = status.get().unwrap_or(0);
                if !range_status_acceptable(code, start) {
                    rejected = Some(code);
                    return Ok(0);
                }
                match on_chunk(data) {
                    ChunkFlow::Continue => Ok(data.len()),
                    ChunkFlow::Abort => {
                        aborted = true;
                        Ok(0)
                    }
                }
            })?;
            transfer.perform()
        };

        if let Some(code) = rejected {
            return Err(TransportError::Status(code));
        }
        match performed {
            Ok(()) => {}
            Err(e) if e.is_write_error() && aborted => return Ok(FetchOutcome::Aborted),
            Err(e) => return Err(e.into()),
        }

        let code = easy.response_code()?;
        if !range_status_acceptable(code, start) {
            return Err(TransportError::Status(code));
        }
        Ok(FetchOutcome::Finished)
    }
}
