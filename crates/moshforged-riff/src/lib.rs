//! Moshforged-RIFF: chunk walking and fragment mutation for AVI files
//!
//! This crate reads RIFF/AVI containers without decoding any codec data and
//! rewrites the video stream fragments to produce datamoshed output that
//! still parses as the same container.
//!
//! # Modules
//!
//! - `riff` - header validation, chunk descriptors and the region walker
//! - `classify` - payload-bearing fragment detection by chunk tag
//! - `mosh` - the removal/duplication/corruption policy
//! - `corrupt` - seeded random byte corruption
//! - `writer` - a small builder for assembling RIFF files
//!
//! # Layout
//!
//! ```text
//! RIFF <size> 'AVI '
//! ├── LIST 'hdrl'   (headers, copied through)
//! ├── LIST 'movi'
//! │   ├── 00dc      (video fragment, mutated)
//! │   ├── 01wb      (audio, copied through)
//! │   └── ...
//! └── idx1          (index, copied through)
//! ```

pub mod classify;
pub mod corrupt;
pub mod error;
pub mod mosh;
pub mod riff;
pub mod writer;

pub use classify::{is_payload_fragment, nal_unit_kind, NalKind};
pub use corrupt::{corrupt_bytes, corrupt_file, CorruptStats};
pub use error::{Error, Result};
pub use mosh::{mosh, mosh_file, mosh_into, MoshOutput, MoshParams, MoshStats};
pub use riff::{Chunk, ChunkKind, ChunkWalker, FourCc, RiffHeader};
pub use writer::RiffBuilder;
