//! Effect dispatch.
//!
//! An effect name is resolved to an [`Effect`] once, when a job is
//! submitted; workers only ever see the resolved variant.

use moshforged_riff::{corrupt_file, mosh_file, MoshParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Effects backed by an external transcoder, which this build does not ship.
const EXTERNAL_EFFECTS: &[&str] = &[
    "glitch",
    "corruption",
    "channel_shift",
    "pixel_sort",
    "scanline_displace",
    "duallayer",
    "rgbdrift",
    "echotrail",
    "glitchmosaic",
    "chromaticblur",
    "kaleidoscope",
];

/// Intensity above which datamosh drops fragments.
const DATAMOSH_REMOVAL_THRESHOLD: f64 = 0.1;
/// Intensity above which datamosh replays fragments.
const DATAMOSH_DUPLICATION_THRESHOLD: f64 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("Effect '{0}' requires an external transcoder and is not supported")]
    Unsupported(String),
}

/// A mutation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Fragment policy with the parameters exactly as given.
    #[default]
    Mosh,
    /// Fragment policy with parameters derived from the intensity.
    Datamosh,
    /// Seeded random byte replacement.
    ByteCorruption,
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Mosh => "mosh",
            Effect::Datamosh => "datamosh",
            Effect::ByteCorruption => "byte_corruption",
        }
    }

    /// Parameters the effect actually runs with.
    pub fn resolve_params(&self, params: &MoshParams) -> MoshParams {
        match self {
            Effect::Datamosh => {
                let intensity = params.intensity;
                let duplicate = intensity > DATAMOSH_DUPLICATION_THRESHOLD;
                MoshParams {
                    intensity,
                    remove_fragments: intensity > DATAMOSH_REMOVAL_THRESHOLD,
                    duplicate_fragments: duplicate,
                    duplication_count: if duplicate {
                        (intensity * 60.0) as u32 + 20
                    } else {
                        0
                    },
                    seed: params.seed,
                }
            }
            Effect::Mosh | Effect::ByteCorruption => *params,
        }
    }

    /// Parameter sets used for batch submission.
    pub fn presets(&self) -> Vec<MoshParams> {
        [(0.4, 44), (0.7, 62), (1.0, 80)]
            .into_iter()
            .map(|(intensity, duplication_count)| MoshParams {
                intensity,
                remove_fragments: true,
                duplicate_fragments: true,
                duplication_count,
                seed: None,
            })
            .collect()
    }

    /// Run the effect from `input` to `output`, returning the bytes written.
    ///
    /// This is blocking file I/O; async callers should use `spawn_blocking`.
    pub fn apply(
        &self,
        input: &Path,
        output: &Path,
        params: &MoshParams,
    ) -> moshforged_riff::Result<u64> {
        let params = self.resolve_params(params);
        tracing::debug!("Applying {} to {:?}: {:?}", self, input, params);

        match self {
            Effect::Mosh | Effect::Datamosh => {
                mosh_file(input, output, &params).map(|stats| stats.bytes_written)
            }
            Effect::ByteCorruption => {
                corrupt_file(input, output, params.intensity, params.seed.unwrap_or_default())?;
                Ok(std::fs::metadata(output)
                    .map_err(|e| moshforged_riff::Error::file(output, e))?
                    .len())
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = EffectError;

    /// Unknown names fall back to [`Effect::Mosh`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "datamosh" => Ok(Effect::Datamosh),
            "byte_corruption" => Ok(Effect::ByteCorruption),
            n if EXTERNAL_EFFECTS.contains(&n) => Err(EffectError::Unsupported(name)),
            _ => Ok(Effect::Mosh),
        }
    }
}
