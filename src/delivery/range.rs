use crate::core::error::StreamError;

// ---------------------------------------------------------------------------
// HTTP Range resolution
// ---------------------------------------------------------------------------

/// The byte span and status a stream response must carry. Pure data; the
/// transport layer derives Content-Length, Content-Range and the status
/// code from it. `start`/`end` are inclusive offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    /// Number of bytes to serve. Zero only for an empty underlying file.
    pub len: u64,
    /// True for a 206 Partial Content response, false for 200.
    pub partial: bool,
}

impl ResolvedRange {
    fn full(total_len: u64) -> Self {
        Self {
            start: 0,
            len: total_len,
            partial: false,
        }
    }

    /// Inclusive end offset. Meaningless when `len` is zero.
    pub fn end(&self) -> u64 {
        self.start + self.len.saturating_sub(1)
    }

    pub fn status(&self) -> u16 {
        if self.partial {
            206
        } else {
            200
        }
    }

    /// `Content-Range` header value for 206 responses.
    pub fn content_range(&self, total_len: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end(), total_len)
    }
}

/// Resolve a Range header against the total resource length.
///
/// Only `bytes=<start>-<end>` with an optional end is honored, and only
/// the first range of a multi-range request. Anything unparseable
/// degrades to a full-content response: range support is an
/// optimization, not a contract the client can break the response with.
/// A start at or beyond the resource length is the one hard failure
/// (416), since no bytes could satisfy it.
pub fn resolve(range_header: Option<&str>, total_len: u64) -> Result<ResolvedRange, StreamError> {
    let Some(header) = range_header else {
        return Ok(ResolvedRange::full(total_len));
    };

    let Some((start, end)) = parse_bytes_range(header) else {
        return Ok(ResolvedRange::full(total_len));
    };

    if start >= total_len {
        return Err(StreamError::RangeNotSatisfiable { start, total_len });
    }

    let end = match end {
        Some(e) if e < start => return Ok(ResolvedRange::full(total_len)),
        Some(e) => e.min(total_len - 1),
        None => total_len - 1,
    };

    Ok(ResolvedRange {
        start,
        len: end - start + 1,
        partial: true,
    })
}

/// Parse `bytes=<start>-[<end>]`, taking the first range if several are
/// given. Returns None on anything else (including suffix ranges).
fn parse_bytes_range(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start_str, end_str) = first.split_once('-')?;
    let start: u64 = start_str.trim().parse().ok()?;
    let end_str = end_str.trim();
    if end_str.is_empty() {
        Some((start, None))
    } else {
        Some((start, Some(end_str.parse().ok()?)))
    }
}
