//! Range math and segment planning for direct downloads.
//!
//! Splits a file of known size into disjoint byte ranges, one per parallel
//! connection. Coverage invariant: the planned ranges tile `[0, total_size)`
//! exactly, with no gaps or overlaps.

/// A single byte range: `[start, end)` (half-open).
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
        self.start >= self.end
    }

    /// Range value in curl's `start-end` form (inclusive end).
    pub fn curl_range_value(&self) -> String {
        if self.is_empty() {
            "0-0".to_string()
        } else {
            format!("{}-{}", self.start, self.end - 1)
        }
    }
}

/// Builds a segment plan for a given total size and segment count.
///
/// Segments are as equal as possible; earlier segments absorb the remainder.
/// Returns an empty vec if `total_size` is 0 or `segment_count` is 0.
pub fn plan_segments(total_size: u64, segment_count: usize) -> Vec<Segment> {
    if total_size == 0 || segment_count == 0 {
        return Vec::new();
    }

    let segment_count = segment_count as u64;
    let base = total_size / segment_count;
    let remainder = total_size % segment_count;

    let mut out = Vec::with_capacity(segment_count as usize);
    let mut offset = 0u64;

    for i in 0..segment_count {
        let len = base + if i < remainder { 1 } else { 0 };
        let end = (offset + len).min(total_size);
        out.push(Segment { start: offset, end });
        offset = end;
    }

    out
}
