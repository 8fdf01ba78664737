//! RIFF file assembly.
//!
//! [`RiffBuilder`] lays out chunks with correct size fields and pad bytes.
//! It is used to synthesize AVI files for tests and benchmarks.

use crate::riff::FourCc;

/// Builder for an `AVI ` RIFF buffer.
#[derive(Debug, Default, Clone)]
pub struct RiffBuilder {
    body: Vec<u8>,
}

impl RiffBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf chunk, padding odd payloads.
    pub fn chunk(mut self, tag: &[u8; 4], payload: &[u8]) -> Self {
        write_chunk(&mut self.body, tag, payload);
        self
    }

    /// Append a `LIST` chunk whose children are written by `build`.
    pub fn list(mut self, list_type: FourCc, build: impl FnOnce(RiffBuilder) -> RiffBuilder) -> Self {
        let children = build(RiffBuilder::new()).body;
        let mut payload = Vec::with_capacity(children.len() + 4);
        payload.extend_from_slice(&list_type.0);
        payload.extend_from_slice(&children);
        write_chunk(&mut self.body, &FourCc::LIST.0, &payload);
        self
    }

    /// Append bytes with no framing.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Prefix the RIFF header and return the file bytes.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 12);
        out.extend_from_slice(&FourCc::RIFF.0);
        out.extend_from_slice(&((self.body.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(&FourCc::AVI.0);
        out.extend_from_slice(&self.body);
        out
    }
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}
