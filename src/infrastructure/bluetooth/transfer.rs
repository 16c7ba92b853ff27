//! Chunked Transfer Engine
//!
//! Pure chunking state for one print operation. The service drives it: take
//! a chunk, put it on the wire in acknowledged mode, and only come back for
//! the next chunk once the previous write completed. Exactly one chunk is
//! ever in flight.

/// State of an in-flight buffer transfer. Offset strictly increases from 0
/// to the total length; the transfer is complete when they are equal.
pub struct ChunkedTransfer {
    data: Vec<u8>,
    chunk_size: usize,
    offset: usize,
}

impl ChunkedTransfer {
    /// Chunk size is `len / divisor`, clamped to at least one byte so short
    /// buffers still make progress.
    pub fn new(data: Vec<u8>, chunk_divisor: usize) -> Self {
        let chunk_size = (data.len() / chunk_divisor.max(1)).max(1);
        Self {
            data,
            chunk_size,
            offset: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.data.len()
    }

    /// Bytes handed to the adapter so far.
    pub fn sent(&self) -> usize {
        self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.data.len()
    }

    /// The next chunk to write, clipped to the remaining bytes. Advances
    /// the offset; `None` once the buffer is exhausted.
    pub fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = &self.data[self.offset..end];
        self.offset = end;
        Some(chunk)
    }
}
