//! Segment type and range planning.

/// A single segment: byte range [start, end) (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Segment {
    /// Length of this segment in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First absolute offset still to fetch after `resume_offset` bytes were written.
    pub fn resume_start(&self, resume_offset: u64) -> u64 {
        self.start + resume_offset.min(self.len())
    }

    /// Bytes left to fetch after `resume_offset` bytes were written.
    pub fn remaining(&self, resume_offset: u64) -> u64 {
        self.end.saturating_sub(self.resume_start(resume_offset))
    }
}

/// Builds a segment plan for a given total size and segment count.
///
/// Every segment is `total_size / segment_count` bytes long except the last,
/// which also takes the remainder. Returns an empty vec if `segment_count` is 0;
/// a zero `total_size` yields `segment_count` empty segments.
pub fn plan_segments(total_size: u64, segment_count: usize) -> Vec<Segment> {
    if segment_count == 0 {
        return Vec::new();
    }

    let count = segment_count as u64;
    let block = total_size / count;

    let mut out = Vec::with_capacity(segment_count);
    for i in 0..count {
        let start = i * block;
        let end = if i + 1 == count { total_size } else { start + block };
        out.push(Segment { start, end });
    }
    out
}

/// Resume offsets for `segments` from a persisted vector: one entry per
/// segment, each clamped to its segment length. Returns `None` when the
/// persisted vector does not match the plan (different segment count).
pub fn clamp_offsets(segments: &[Segment], persisted: &[u64]) -> Option<Vec<u64>> {
    if persisted.len() != segments.len() {
        return None;
    }
    Some(
        segments
            .iter()
            .zip(persisted)
            .map(|(s, &o)| o.min(s.len()))
            .collect(),
    )
}
