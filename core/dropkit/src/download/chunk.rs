//! Byte-range chunk planning.

/// One contiguous byte range of the remote resource.
///
/// Offsets are inclusive on both ends, matching the HTTP `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeChunk {
    /// Position of the chunk in the merged output (0-based).
    pub index: usize,
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
}

impl ByteRangeChunk {
    /// Number of bytes covered by the chunk.
    #[must_use = "returns the length without side effects"]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; a planned chunk covers at least one byte.
    #[must_use = "returns the emptiness check without side effects"]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Value for the HTTP `Range` request header.
    #[must_use]
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Splits `[0, content_length - 1]` into chunks of `chunk_size` bytes.
///
/// The last chunk is truncated to the remainder. Returns an empty plan when
/// either argument is zero.
#[must_use]
pub fn plan_chunks(content_length: u64, chunk_size: u64) -> Vec<ByteRangeChunk> {
    if content_length == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let count = content_length.div_ceil(chunk_size);
    (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = start.saturating_add(chunk_size - 1).min(content_length - 1);
            ByteRangeChunk {
                index: usize::try_from(i).unwrap_or(usize::MAX),
                start,
                end,
            }
        })
        .collect()
}
