//! Seeded random byte corruption.
//!
//! Unlike the fragment policy in [`crate::mosh`], this effect ignores the
//! chunk structure: any byte past the container header may be replaced,
//! including chunk headers, so the output is usually only partially
//! parsable.

use crate::riff::{RiffHeader, RIFF_HEADER_LEN};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;

/// Replacement probability per byte at intensity 1.0.
const RATE_PER_INTENSITY: f64 = 0.001;

/// Counters collected while corrupting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorruptStats {
    /// Bytes eligible for corruption.
    pub candidates: u64,
    /// Bytes replaced with a random value.
    pub replaced: u64,
}

/// Replace bytes after the header at random.
///
/// Each byte is replaced with probability `intensity * 0.001`. The same
/// `seed` always produces the same output.
pub fn corrupt_bytes(data: &[u8], intensity: f64, seed: u64) -> Result<(Vec<u8>, CorruptStats)> {
    RiffHeader::parse(data)?;

    let rate = (intensity * RATE_PER_INTENSITY).clamp(0.0, 1.0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = data.to_vec();
    let mut stats = CorruptStats {
        candidates: (out.len() - RIFF_HEADER_LEN) as u64,
        replaced: 0,
    };

    for byte in &mut out[RIFF_HEADER_LEN..] {
        if rng.gen::<f64>() < rate {
            *byte = rng.gen();
            stats.replaced += 1;
        }
    }

    tracing::debug!(
        "Corrupted {} of {} bytes (rate {:.5}, seed {})",
        stats.replaced,
        stats.candidates,
        rate,
        seed
    );
    Ok((out, stats))
}

/// File-to-file variant of [`corrupt_bytes`].
pub fn corrupt_file(input: &Path, output: &Path, intensity: f64, seed: u64) -> Result<CorruptStats> {
    let data = fs::read(input).map_err(|e| Error::file(input, e))?;
    let (corrupted, stats) = corrupt_bytes(&data, intensity, seed)?;
    fs::write(output, corrupted).map_err(|e| Error::file(output, e))?;
    Ok(stats)
}
