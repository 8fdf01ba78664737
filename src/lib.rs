//! Moshforged - datamosh automation for AVI files
//!
//! The library wires the fragment mutation engine from `moshforged-riff`
//! into a bounded worker pool with a job registry, file-growth progress
//! monitoring and live event fanout. It is exposed for the CLI and for
//! integration testing.

pub mod config;
pub mod effects;
pub mod events;
pub mod ids;
pub mod monitor;
pub mod processor;
pub mod state;
