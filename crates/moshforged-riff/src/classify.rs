//! Fragment classification by chunk tag.

use crate::riff::FourCc;

/// Tags of chunks carrying video frame data.
///
/// `##dc` is compressed and `##db` uncompressed video for streams 0 and 1;
/// `00iv` and `00vc` are legacy Indeo and VfW codec markers.
const PAYLOAD_TAGS: [FourCc; 6] = [
    FourCc(*b"00dc"),
    FourCc(*b"01dc"),
    FourCc(*b"00db"),
    FourCc(*b"01db"),
    FourCc(*b"00iv"),
    FourCc(*b"00vc"),
];

/// Whether a chunk with this tag is subject to the mutation policy.
pub fn is_payload_fragment(tag: FourCc) -> bool {
    PAYLOAD_TAGS.contains(&tag)
}

/// NAL unit type found at the start of an Annex-B payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum NalKind {
    /// Sequence parameter set (type 7), which precedes keyframes.
    Sps,
    /// Coded slice of a non-IDR picture (type 1).
    NonIdrSlice,
    /// Any other NAL type.
    Other(u8),
}

/// Inspect a payload for an Annex-B start code (3 or 4 bytes) followed by a
/// NAL header.
///
/// Only used for diagnostics; the mutation policy does not look at frame types.
pub fn nal_unit_kind(payload: &[u8]) -> Option<NalKind> {
    match payload {
        [0x00, 0x00, 0x00, 0x01, header, ..] | [0x00, 0x00, 0x01, header, ..] => Some(match header & 0x1F {
            7 => NalKind::Sps,
            1 => NalKind::NonIdrSlice,
            other => NalKind::Other(other),
        }),
        _ => None,
    }
}
