//! Fragment mutation policy.
//!
//! Video fragments inside the `movi` list are numbered in file order starting
//! at 0. Fragments at even positions are dropped or replayed according to
//! [`MoshParams`]; everything else is copied through byte for byte. A list
//! whose contents change gets its size field rewritten (and a pad byte when
//! the new size is odd). The RIFF header is always copied verbatim.

use crate::classify::is_payload_fragment;
use crate::riff::{Chunk, ChunkKind, ChunkWalker, FourCc, RiffHeader, MAX_LIST_DEPTH, RIFF_HEADER_LEN};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// First payload byte touched by the corruption transform.
const CORRUPT_WINDOW_START: usize = 16;
/// Upper bound (exclusive) of the corruption window.
const CORRUPT_WINDOW_END: usize = 50;
/// Stride of the corruption transform.
const CORRUPT_STRIDE: usize = 4;
/// Fragments this short are never corrupted.
const MIN_CORRUPT_PAYLOAD: usize = 20;

/// Mutation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MoshParams {
    /// Effect strength. Carried through, not interpreted by the engine.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub intensity: f64,
    /// Drop fragments at even positions.
    #[cfg_attr(feature = "serialize", serde(rename = "iframe_removal", default))]
    pub remove_fragments: bool,
    /// Replay fragments at even positions.
    #[cfg_attr(feature = "serialize", serde(rename = "pframe_duplication", default))]
    pub duplicate_fragments: bool,
    /// Extra copies written per replayed fragment.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub duplication_count: u32,
    /// Seed for effects that use randomness.
    #[cfg_attr(feature = "serialize", serde(default, skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
}

impl MoshParams {
    /// Parameters that leave the stream untouched.
    pub fn passthrough(intensity: f64) -> Self {
        Self {
            intensity,
            ..Self::default()
        }
    }

    /// Whether these parameters change anything.
    pub fn is_noop(&self) -> bool {
        !self.remove_fragments && !(self.duplicate_fragments && self.duplication_count > 0)
    }
}

/// Counters collected while mutating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MoshStats {
    /// Payload-bearing fragments seen inside `movi`.
    pub fragments: u64,
    /// Fragments dropped.
    pub dropped: u64,
    /// Fragments replayed.
    pub duplicated: u64,
    /// Extra copies written, corrupted or not.
    pub copies_written: u64,
    /// Extra copies that went through the corruption transform.
    pub corrupted_copies: u64,
    /// Bytes copied from unparsable tails.
    pub raw_tail_bytes: u64,
    /// Total bytes written, header included.
    pub bytes_written: u64,
}

/// Mutated file plus statistics.
#[derive(Debug, Clone)]
pub struct MoshOutput {
    pub data: Vec<u8>,
    pub stats: MoshStats,
}

/// Mutate an in-memory AVI file.
pub fn mosh(input: &[u8], params: &MoshParams) -> Result<MoshOutput> {
    let mut data = Vec::with_capacity(input.len());
    let stats = mosh_into(input, params, &mut data)?;
    Ok(MoshOutput { data, stats })
}

/// Mutate an AVI file, streaming the result into `out`.
///
/// The header is validated before anything is written.
pub fn mosh_into<W: Write>(input: &[u8], params: &MoshParams, out: &mut W) -> Result<MoshStats> {
    RiffHeader::parse(input)?;

    let mut mosher = Mosher {
        data: input,
        params,
        counter: 0,
        stats: MoshStats::default(),
    };

    mosher.write(out, &input[..RIFF_HEADER_LEN])?;
    mosher.walk(ChunkWalker::new(input, RIFF_HEADER_LEN, input.len()), 0, false, out)?;

    tracing::debug!(
        "Moshed {} fragments: {} dropped, {} duplicated, {} extra copies ({} corrupted)",
        mosher.stats.fragments,
        mosher.stats.dropped,
        mosher.stats.duplicated,
        mosher.stats.copies_written,
        mosher.stats.corrupted_copies
    );

    Ok(mosher.stats)
}

/// Read `input`, mutate it and write the result to `output`.
///
/// The output is written incrementally, so its size grows while the
/// mutation runs.
pub fn mosh_file(input: &Path, output: &Path, params: &MoshParams) -> Result<MoshStats> {
    let data = fs::read(input).map_err(|e| Error::file(input, e))?;
    RiffHeader::parse(&data)?;

    let file = File::create(output).map_err(|e| Error::file(output, e))?;
    let mut writer = BufWriter::new(file);

    let stats = mosh_into(&data, params, &mut writer).map_err(|e| match e {
        Error::Io(source) => Error::file(output, source),
        other => other,
    })?;
    writer.flush().map_err(|e| Error::file(output, e))?;

    tracing::info!(
        "Wrote {} bytes to {:?} ({} bytes in)",
        stats.bytes_written,
        output,
        data.len()
    );
    Ok(stats)
}

/// Apply the corruption transform in place.
///
/// Every 4th byte from offset 16 up to `min(len - 4, 50)` becomes
/// `(b + 127) % 255`.
pub fn corrupt_payload(payload: &mut [u8]) {
    let limit = payload
        .len()
        .saturating_sub(CORRUPT_STRIDE)
        .min(CORRUPT_WINDOW_END);
    for i in (CORRUPT_WINDOW_START..limit).step_by(CORRUPT_STRIDE) {
        payload[i] = ((payload[i] as u16 + 127) % 255) as u8;
    }
}

struct Mosher<'a> {
    data: &'a [u8],
    params: &'a MoshParams,
    counter: u64,
    stats: MoshStats,
}

impl<'a> Mosher<'a> {
    fn write<W: Write>(&mut self, out: &mut W, bytes: &[u8]) -> Result<()> {
        out.write_all(bytes)?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn walk<W: Write>(
        &mut self,
        walker: ChunkWalker<'a>,
        depth: usize,
        in_movi: bool,
        out: &mut W,
    ) -> Result<()> {
        let data = self.data;
        for chunk in walker {
            match chunk.kind {
                ChunkKind::List(list_type) if depth < MAX_LIST_DEPTH => {
                    let inside = in_movi || list_type == FourCc::MOVI;
                    let children_len = self.measure(chunk.children(data), depth + 1, inside)?;

                    if children_len + 4 == chunk.payload_len as u64 {
                        self.write(out, chunk.list_prefix(data))?;
                        self.walk(chunk.children(data), depth + 1, inside, out)?;
                        self.write(out, chunk.padding(data))?;
                        continue;
                    }

                    let size = children_len + 4;
                    let declared = u32::try_from(size)
                        .map_err(|_| Error::ListTooLarge { list_type, size })?;
                    tracing::trace!(
                        "Resizing LIST '{}' at offset {}: {} -> {} bytes",
                        list_type,
                        chunk.offset,
                        chunk.declared_size,
                        declared
                    );
                    self.write(out, &FourCc::LIST.0)?;
                    self.write(out, &declared.to_le_bytes())?;
                    self.write(out, &list_type.0)?;
                    self.walk(chunk.children(data), depth + 1, inside, out)?;
                    if declared % 2 == 1 {
                        self.write(out, &[0])?;
                    }
                }
                ChunkKind::RawTail => {
                    tracing::debug!(
                        "Copying {} unparsable bytes at offset {}",
                        chunk.payload_len,
                        chunk.offset
                    );
                    self.stats.raw_tail_bytes += chunk.payload_len as u64;
                    self.write(out, chunk.bytes(data))?;
                }
                _ if in_movi && is_payload_fragment(chunk.fourcc) => {
                    self.fragment(&chunk, out)?;
                }
                _ => self.write(out, chunk.bytes(data))?,
            }
        }
        Ok(())
    }

    /// Number of bytes `walk` would emit for these chunks, without touching
    /// the fragment counter or the statistics.
    fn measure(&self, walker: ChunkWalker<'a>, depth: usize, in_movi: bool) -> Result<u64> {
        let mut dry = Mosher {
            data: self.data,
            params: self.params,
            counter: self.counter,
            stats: MoshStats::default(),
        };
        dry.walk(walker, depth, in_movi, &mut io::sink())?;
        Ok(dry.stats.bytes_written)
    }

    fn fragment<W: Write>(&mut self, chunk: &Chunk, out: &mut W) -> Result<()> {
        let index = self.counter;
        self.counter += 1;
        self.stats.fragments += 1;

        let original = chunk.bytes(self.data);
        let even = index % 2 == 0;

        if even && self.params.remove_fragments {
            self.stats.dropped += 1;
            return Ok(());
        }

        self.write(out, original)?;

        if !(even && self.params.duplicate_fragments) {
            return Ok(());
        }

        self.stats.duplicated += 1;
        let corrupted = (chunk.payload_len > MIN_CORRUPT_PAYLOAD).then(|| {
            let mut copy = original.to_vec();
            let start = chunk.payload_offset - chunk.offset;
            corrupt_payload(&mut copy[start..start + chunk.payload_len]);
            copy
        });

        for i in 0..self.params.duplication_count {
            match &corrupted {
                Some(copy) if i % 3 == 0 => {
                    self.write(out, copy)?;
                    self.stats.corrupted_copies += 1;
                }
                _ => self.write(out, original)?,
            }
            self.stats.copies_written += 1;
        }

        Ok(())
    }
}
