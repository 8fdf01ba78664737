//! RIFF container parsing.
//!
//! This module validates the 12-byte container header and walks the chunk
//! tree below it. Parsing works on an in-memory buffer; every descriptor is
//! an offset into that buffer, so callers can copy chunks out verbatim.

mod chunk;
mod walker;

pub use chunk::{Chunk, ChunkKind, FourCc, CHUNK_HEADER_LEN};
pub use walker::ChunkWalker;

use crate::classify::{is_payload_fragment, nal_unit_kind, NalKind};
use crate::{Error, Result};

/// Size of the container header: magic, size, form type.
pub const RIFF_HEADER_LEN: usize = 12;

/// Lists nested deeper than this are treated as opaque leaves.
pub const MAX_LIST_DEPTH: usize = 16;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffHeader {
    /// Size field of the RIFF chunk (file size minus 8 for a well-formed file).
    pub declared_size: u32,
    /// Form type, always `AVI ` for accepted input.
    pub form_type: FourCc,
}

impl RiffHeader {
    /// Validate and parse the first 12 bytes of a buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RIFF_HEADER_LEN {
            return Err(Error::Truncated {
                need: RIFF_HEADER_LEN,
                have: data.len(),
            });
        }

        let magic = FourCc([data[0], data[1], data[2], data[3]]);
        if magic != FourCc::RIFF {
            return Err(Error::invalid_header(format!(
                "expected RIFF magic, found '{}'",
                magic
            )));
        }

        let form_type = FourCc([data[8], data[9], data[10], data[11]]);
        if form_type != FourCc::AVI {
            return Err(Error::invalid_header(format!(
                "unsupported form type '{}'",
                form_type
            )));
        }

        Ok(Self {
            declared_size: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            form_type,
        })
    }
}

/// Walker over the top-level chunks, after validating the header.
pub fn top_level(data: &[u8]) -> Result<ChunkWalker<'_>> {
    RiffHeader::parse(data)?;
    Ok(ChunkWalker::new(data, RIFF_HEADER_LEN, data.len()))
}

/// Flattened, depth-annotated view of one chunk.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkInfo {
    pub depth: usize,
    pub fourcc: String,
    pub list_type: Option<String>,
    pub offset: usize,
    pub declared_size: u32,
    pub payload_len: usize,
    pub raw_tail: bool,
    /// Whether this is a video stream fragment inside `movi`.
    pub payload_fragment: bool,
    /// Annex-B NAL type of a payload fragment, when recognizable.
    pub nal: Option<NalKind>,
}

/// List every chunk in file order, descending into containers.
pub fn walk_tree(data: &[u8]) -> Result<Vec<ChunkInfo>> {
    let mut out = Vec::new();
    collect(data, top_level(data)?, 0, false, &mut out);
    Ok(out)
}

fn collect(
    data: &[u8],
    walker: ChunkWalker<'_>,
    depth: usize,
    in_movi: bool,
    out: &mut Vec<ChunkInfo>,
) {
    for chunk in walker {
        let payload_fragment =
            in_movi && !chunk.is_raw_tail() && is_payload_fragment(chunk.fourcc);
        out.push(ChunkInfo {
            depth,
            fourcc: chunk.fourcc.to_string(),
            list_type: chunk.list_type().map(|t| t.to_string()),
            offset: chunk.offset,
            declared_size: chunk.declared_size,
            payload_len: chunk.payload_len,
            raw_tail: chunk.is_raw_tail(),
            payload_fragment,
            nal: if payload_fragment {
                nal_unit_kind(chunk.payload(data))
            } else {
                None
            },
        });

        if let Some(list_type) = chunk.list_type().filter(|_| depth < MAX_LIST_DEPTH) {
            let inside = in_movi || list_type == FourCc::MOVI;
            collect(data, chunk.children(data), depth + 1, inside, out);
        }
    }
}
