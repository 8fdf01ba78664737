//! RIFF chunk definitions.

use super::ChunkWalker;

/// Size of a chunk header: 4-byte tag plus 4-byte little-endian size.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Four-character chunk code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const RIFF: Self = Self(*b"RIFF");
    pub const AVI: Self = Self(*b"AVI ");
    pub const LIST: Self = Self(*b"LIST");
    pub const HDRL: Self = Self(*b"hdrl");
    pub const STRL: Self = Self(*b"strl");
    pub const ODML: Self = Self(*b"odml");
    pub const INFO: Self = Self(*b"INFO");
    pub const MOVI: Self = Self(*b"movi");
    pub const REC: Self = Self(*b"rec ");
    pub const IDX1: Self = Self(*b"idx1");
    pub const JUNK: Self = Self(*b"JUNK");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Read a code from the start of a slice, if it holds four bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let code: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(code))
    }

    /// Whether this is a LIST sub-type the walker descends into.
    pub fn is_known_list_type(&self) -> bool {
        matches!(
            *self,
            Self::MOVI | Self::HDRL | Self::STRL | Self::ODML | Self::INFO | Self::REC
        )
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

/// What a walker step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Ordinary chunk; its payload is opaque.
    Leaf,
    /// `LIST` chunk with a recognized sub-type; its payload holds chunks.
    List(FourCc),
    /// Unparsable remainder of a region, copied as-is.
    RawTail,
}

/// Chunk descriptor produced by [`ChunkWalker`].
///
/// All offsets are absolute positions in the buffer that was walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk tag. For a raw tail this is whatever bytes were present, zero-filled.
    pub fourcc: FourCc,
    /// Size field as stored in the header (0 for a raw tail).
    pub declared_size: u32,
    /// Offset of the chunk header.
    pub offset: usize,
    /// Offset of the first payload byte.
    pub payload_offset: usize,
    /// Payload length, excluding any pad byte.
    pub payload_len: usize,
    /// Offset where the next sibling starts (after the pad byte, if any).
    pub span_end: usize,
    /// Chunk classification.
    pub kind: ChunkKind,
}

impl Chunk {
    /// Whether this chunk holds nested chunks.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, ChunkKind::List(_))
    }

    /// Whether this is the unparsable tail of a region.
    pub fn is_raw_tail(&self) -> bool {
        matches!(self.kind, ChunkKind::RawTail)
    }

    /// The LIST sub-type, for container chunks.
    pub fn list_type(&self) -> Option<FourCc> {
        match self.kind {
            ChunkKind::List(list_type) => Some(list_type),
            _ => None,
        }
    }

    /// End of the payload (exclusive), before any pad byte.
    pub fn payload_end(&self) -> usize {
        self.payload_offset + self.payload_len
    }

    /// Whether a pad byte follows the payload in the walked buffer.
    pub fn has_pad(&self) -> bool {
        self.span_end > self.payload_end()
    }

    /// Payload bytes.
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.payload_offset..self.payload_end()]
    }

    /// Header, payload and pad byte exactly as stored.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.span_end]
    }

    /// Header plus list sub-type of a container, i.e. everything before its children.
    pub fn list_prefix<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        match self.kind {
            ChunkKind::List(_) => &data[self.offset..self.payload_offset + 4],
            _ => &data[self.offset..self.offset],
        }
    }

    /// Pad byte after the payload, if present.
    pub fn padding<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.payload_end()..self.span_end]
    }

    /// Walker over the children of a container chunk.
    ///
    /// Leaf and raw-tail chunks yield an empty walker.
    pub fn children<'a>(&self, data: &'a [u8]) -> ChunkWalker<'a> {
        match self.kind {
            ChunkKind::List(_) => ChunkWalker::new(data, self.payload_offset + 4, self.payload_end()),
            _ => ChunkWalker::new(data, self.span_end, self.span_end),
        }
    }
}
