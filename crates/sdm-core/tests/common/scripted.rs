//! In-memory `Transport` for engine tests.
//!
//! Serves one body for every URL in fixed-size chunks, records every ranged
//! request, can fail requests starting at a given offset and can hold
//! delivery once a byte budget is used up (to pause mid-download) or pace
//! every chunk to keep runs alive for a while.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use sdm_core::transport::{ChunkFlow, FetchOutcome, ProbeResult, Transport, TransportError};

struct Budget {
    delivered: u64,
    limit: u64,
}

pub struct ScriptedTransport {
    body: Vec<u8>,
    chunk: usize,
    probe_status: u32,
    fail_start: Option<u64>,
    pace: Duration,
    probes: AtomicUsize,
    requests: Mutex<Vec<(u64, u64)>>,
    budget: Mutex<Budget>,
    budget_cv: Condvar,
}

impl ScriptedTransport {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            chunk: 10,
            probe_status: 200,
            fail_start: None,
            pace: Duration::ZERO,
            probes: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            budget: Mutex::new(Budget {
                delivered: 0,
                limit: u64::MAX,
            }),
            budget_cv: Condvar::new(),
        }
    }

    pub fn chunk_size(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Deliver at most `bytes` in total until `release` is called.
    pub fn hold_after(self, bytes: u64) -> Self {
        self.budget.lock().unwrap().limit = bytes;
        self
    }

    /// Ranged requests starting at `start` fail with HTTP 503.
    pub fn failing_at(mut self, start: u64) -> Self {
        self.fail_start = Some(start);
        self
    }

    /// Sleep this long before delivering each chunk.
    pub fn pace(mut self, per_chunk: Duration) -> Self {
        self.pace = per_chunk;
        self
    }

    pub fn probe_status(mut self, status: u32) -> Self {
        self.probe_status = status;
        self
    }

    pub fn release(&self) {
        self.budget.lock().unwrap().limit = u64::MAX;
        self.budget_cv.notify_all();
    }

    pub fn delivered(&self) -> u64 {
        self.budget.lock().unwrap().delivered
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Ranged requests as half-open `(start, end)`, sorted.
    pub fn range_requests(&self) -> Vec<(u64, u64)> {
        let mut r = self.requests.lock().unwrap().clone();
        r.sort_unstable();
        r
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn reserve(&self, n: u64) {
        let mut b = self.budget.lock().unwrap();
        while b.delivered + n > b.limit {
            b = self.budget_cv.wait_timeout(b, Duration::from_millis(20)).unwrap().0;
        }
        b.delivered += n;
    }
}

impl Transport for ScriptedTransport {
    fn probe(&self, _url: &str) -> Result<ProbeResult, TransportError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_status != 200 {
            return Err(TransportError::Status(self.probe_status));
        }
        Ok(ProbeResult {
            status: 200,
            content_length: self.body.len() as u64,
            accept_ranges: true,
        })
    }

    fn fetch_range(
        &self,
        _url: &str,
        start: u64,
        end: u64,
        on_chunk: &mut dyn FnMut(&[u8]) -> ChunkFlow,
    ) -> Result<FetchOutcome, TransportError> {
        self.requests.lock().unwrap().push((start, end));
        if self.fail_start == Some(start) {
            return Err(TransportError::Status(503));
        }
        let end = end.min(self.body.len() as u64) as usize;
        let start = (start as usize).min(end);
        for piece in self.body[start..end].chunks(self.chunk) {
            if !self.pace.is_zero() {
                std::thread::sleep(self.pace);
            }
            self.reserve(piece.len() as u64);
            if on_chunk(piece) == ChunkFlow::Abort {
                return Ok(FetchOutcome::Aborted);
            }
        }
        Ok(FetchOutcome::Finished)
    }
}
