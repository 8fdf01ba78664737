//! Size-guided chunk walker.

use super::{Chunk, ChunkKind, FourCc, CHUNK_HEADER_LEN};
use std::iter::FusedIterator;

/// Iterator over the chunks of one region of a RIFF buffer.
///
/// The walker never looks outside `[start, end)`. When the remaining bytes
/// cannot hold a header, or a declared size runs past the region end, it
/// yields a single [`ChunkKind::RawTail`] covering the rest and stops.
/// Containers are reported, not entered; use [`Chunk::children`] to descend.
#[derive(Debug, Clone)]
pub struct ChunkWalker<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
    done: bool,
}

impl<'a> ChunkWalker<'a> {
    /// Create a walker over `data[start..end]`, clamped to the buffer.
    pub fn new(data: &'a [u8], start: usize, end: usize) -> Self {
        let end = end.min(data.len());
        Self {
            data,
            pos: start.min(end),
            end,
            done: false,
        }
    }

    /// Current position (start of the next chunk).
    pub fn position(&self) -> usize {
        self.pos
    }

    fn raw_tail(&mut self) -> Chunk {
        let start = self.pos;
        let rest = &self.data[start..self.end];

        let mut tag = [0u8; 4];
        let n = rest.len().min(4);
        tag[..n].copy_from_slice(&rest[..n]);
        let declared_size = rest
            .get(4..8)
            .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
            .unwrap_or(0);

        self.pos = self.end;
        self.done = true;

        Chunk {
            fourcc: FourCc(tag),
            declared_size,
            offset: start,
            payload_offset: start,
            payload_len: self.end - start,
            span_end: self.end,
            kind: ChunkKind::RawTail,
        }
    }
}

impl Iterator for ChunkWalker<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.pos >= self.end {
            return None;
        }

        let pos = self.pos;
        if self.end - pos < CHUNK_HEADER_LEN {
            return Some(self.raw_tail());
        }

        let header = &self.data[pos..pos + CHUNK_HEADER_LEN];
        let fourcc = FourCc([header[0], header[1], header[2], header[3]]);
        let declared_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let payload_offset = pos + CHUNK_HEADER_LEN;
        let payload_len = declared_size as usize;
        if payload_len > self.end - payload_offset {
            tracing::trace!(
                "Chunk {} at {} declares {} bytes but only {} remain",
                fourcc,
                pos,
                payload_len,
                self.end - payload_offset
            );
            return Some(self.raw_tail());
        }

        let payload_end = payload_offset + payload_len;
        // A pad byte missing at the very end of the region is tolerated.
        let span_end = (payload_end + (payload_len & 1)).min(self.end);

        let kind = if fourcc == FourCc::LIST && payload_len >= 4 {
            match FourCc::from_slice(&self.data[payload_offset..payload_end]) {
                Some(list_type) if list_type.is_known_list_type() => ChunkKind::List(list_type),
                _ => ChunkKind::Leaf,
            }
        } else {
            ChunkKind::Leaf
        };

        self.pos = span_end;

        Some(Chunk {
            fourcc,
            declared_size,
            offset: pos,
            payload_offset,
            payload_len,
            span_end,
            kind,
        })
    }
}

impl FusedIterator for ChunkWalker<'_> {}
