//! One segment worker: a ranged GET written into the target at absolute offsets.
//!
//! Workers run on the blocking pool and talk to their task only through
//! `SegmentEvent`s: one `Chunk` per write and a final `Done`.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::control::StopToken;
use crate::error::SegmentError;
use crate::segmenter::Segment;
use crate::storage::StorageWriter;
use crate::transport::{ChunkFlow, Transport, TransportError};

/// How a worker that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentOutcome {
    /// Every byte of the range is on disk.
    Completed,
    /// The stop token was observed between chunks.
    Stopped,
}

#[derive(Debug)]
pub(crate) enum SegmentEvent {
    /// `len` bytes of segment `index` were written.
    Chunk { index: usize, len: u64 },
    Done {
        index: usize,
        result: Result<SegmentOutcome, SegmentError>,
    },
}

pub(crate) struct SegmentWorker {
    pub index: usize,
    pub url: String,
    pub segment: Segment,
    pub resume_offset: u64,
    pub storage: StorageWriter,
    pub transport: Arc<dyn Transport>,
    pub stop: StopToken,
    pub events: mpsc::Sender<SegmentEvent>,
}

impl SegmentWorker {
    /// Blocking. Always ends with exactly one `Done` event unless the task
    /// stopped listening.
    pub(crate) fn run(self) {
        let result = self.download();
        match &result {
            Ok(outcome) => tracing::debug!(index = self.index, ?outcome, "segment worker done"),
            Err(e) => tracing::debug!(index = self.index, error = %e, "segment worker failed"),
        }
        let _ = self.events.blocking_send(SegmentEvent::Done {
            index: self.index,
            result,
        });
    }

    fn download(&self) -> Result<SegmentOutcome, SegmentError> {
        if self.segment.remaining(self.resume_offset) == 0 {
            return Ok(SegmentOutcome::Completed);
        }
        let begin = self.segment.resume_start(self.resume_offset);
        let end = self.segment.end;
        if self.stop.is_stopped() {
            return Ok(SegmentOutcome::Stopped);
        }

        let mut pos = begin;
        let mut stopped = false;
        let mut storage_err: Option<std::io::Error> = None;

        let fetched = self.transport.fetch_range(&self.url, begin, end, &mut |data| {
            if self.stop.is_stopped() {
                stopped = true;
                return ChunkFlow::Abort;
            }
            // Bytes past the range end are never written.
            let take = (end - pos).min(data.len() as u64) as usize;
            if take > 0 {
                if let Err(e) = self.storage.write_at(pos, &data[..take]) {
                    storage_err = Some(e);
                    return ChunkFlow::Abort;
                }
                pos += take as u64;
                let event = SegmentEvent::Chunk {
                    index: self.index,
                    len: take as u64,
                };
                if self.events.blocking_send(event).is_err() {
                    stopped = true;
                    return ChunkFlow::Abort;
                }
            }
            if take < data.len() {
                ChunkFlow::Abort
            } else {
                ChunkFlow::Continue
            }
        });

        if let Some(e) = storage_err {
            return Err(SegmentError::Storage(e));
        }
        if stopped {
            return Ok(SegmentOutcome::Stopped);
        }
        match fetched {
            Ok(_) => {}
            Err(TransportError::Status(code)) => return Err(SegmentError::Http(code)),
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(index = self.index, url = %self.url, "segment timed out");
                }
                return Err(SegmentError::Transport(e));
            }
        }
        if pos < end {
            return Err(SegmentError::ShortBody {
                expected: end - begin,
                received: pos - begin,
            });
        }
        Ok(SegmentOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageWriterBuilder;
    use crate::transport::{FetchOutcome, ProbeResult};

    /// Serves `body[start..end]` in fixed-size chunks, optionally padding the
    /// response past the requested end or cutting it short.
    struct FixedBody {
        body: Vec<u8>,
        chunk: usize,
        extra: usize,
        cut_at: Option<u64>,
    }

    impl Transport for FixedBody {
        fn probe(&self, _url: &str) -> Result<ProbeResult, TransportError> {
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
            let stop = self.cut_at.unwrap_or(end).min(end) as usize;
            let mut data = self.body[start as usize..stop].to_vec();
            data.extend(std::iter::repeat(0xEE).take(self.extra));
            for piece in data.chunks(self.chunk) {
                if on_chunk(piece) == ChunkFlow::Abort {
                    return Ok(FetchOutcome::Aborted);
                }
            }
            Ok(FetchOutcome::Finished)
        }
    }

    fn worker(
        transport: FixedBody,
        segment: Segment,
        resume_offset: u64,
        storage: StorageWriter,
    ) -> (SegmentWorker, mpsc::Receiver<SegmentEvent>, StopToken) {
        let (tx, rx) = mpsc::channel(1024);
        let stop = StopToken::new();
        let w = SegmentWorker {
            index: 1,
            url: "http://example.invalid/f".into(),
            segment,
            resume_offset,
            storage,
            transport: Arc::new(transport),
            stop: stop.clone(),
            events: tx,
        };
        (w, rx, stop)
    }

    fn storage(dir: &tempfile::TempDir, len: u64) -> StorageWriter {
        let mut b = StorageWriterBuilder::open_or_create(&dir.path().join("f.bin")).unwrap();
        b.allocate(len).unwrap();
        b.build()
    }

    fn body() -> Vec<u8> {
        (0..200u32).map(|i| (i % 251) as u8).collect()
    }

    fn written(rx: &mut mpsc::Receiver<SegmentEvent>) -> (u64, Option<Result<SegmentOutcome, SegmentError>>) {
        let mut total = 0;
        let mut done = None;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                SegmentEvent::Chunk { index, len } => {
                    assert_eq!(index, 1);
                    total += len;
                }
                SegmentEvent::Done { result, .. } => done = Some(result),
            }
        }
        (total, done)
    }

    #[test]
    fn writes_remaining_range_at_absolute_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let st = storage(&dir, 200);
        let t = FixedBody { body: body(), chunk: 7, extra: 0, cut_at: None };
        let (w, mut rx, _) = worker(t, Segment { start: 100, end: 200 }, 30, st);
        w.run();
        let (total, done) = written(&mut rx);
        assert_eq!(total, 70);
        assert!(matches!(done, Some(Ok(SegmentOutcome::Completed))));
        let file = std::fs::read(dir.path().join("f.bin")).unwrap();
        assert_eq!(&file[130..200], &body()[130..200]);
        assert!(file[100..130].iter().all(|&b| b == 0));
    }

    #[test]
    fn finished_segment_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let st = storage(&dir, 200);
        let t = FixedBody { body: Vec::new(), chunk: 7, extra: 0, cut_at: None };
        let (w, mut rx, _) = worker(t, Segment { start: 0, end: 100 }, 100, st);
        w.run();
        let (total, done) = written(&mut rx);
        assert_eq!(total, 0);
        assert!(matches!(done, Some(Ok(SegmentOutcome::Completed))));
    }

    #[test]
    fn overlong_body_is_cut_at_range_end() {
        let dir = tempfile::tempdir().unwrap();
        let st = storage(&dir, 200);
        let t = FixedBody { body: body(), chunk: 16, extra: 40, cut_at: None };
        let (w, mut rx, _) = worker(t, Segment { start: 0, end: 100 }, 0, st);
        w.run();
        let (total, done) = written(&mut rx);
        assert_eq!(total, 100);
        assert!(matches!(done, Some(Ok(SegmentOutcome::Completed))));
        let file = std::fs::read(dir.path().join("f.bin")).unwrap();
        assert!(file[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn early_close_is_a_short_body() {
        let dir = tempfile::tempdir().unwrap();
        let st = storage(&dir, 200);
        let t = FixedBody { body: body(), chunk: 10, extra: 0, cut_at: Some(150) };
        let (w, mut rx, _) = worker(t, Segment { start: 100, end: 200 }, 0, st);
        w.run();
        let (total, done) = written(&mut rx);
        assert_eq!(total, 50);
        match done {
            Some(Err(SegmentError::ShortBody { expected, received })) => {
                assert_eq!((expected, received), (100, 50));
            }
            other => panic!("expected short body, got {other:?}"),
        }
    }

    #[test]
    fn stop_token_ends_without_failure() {
        let dir = tempfile::tempdir().unwrap();
        let st = storage(&dir, 200);
        let t = FixedBody { body: body(), chunk: 10, extra: 0, cut_at: None };
        let (w, mut rx, stop) = worker(t, Segment { start: 0, end: 200 }, 0, st);
        stop.stop();
        w.run();
        let (total, done) = written(&mut rx);
        assert_eq!(total, 0);
        assert!(matches!(done, Some(Ok(SegmentOutcome::Stopped))));
    }
}
