use crate::events::BroadcastConfig;
use crate::monitor::MonitorConfig;
use crate::processor::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSettings {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Jobs that may wait before submission blocks
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    3
}
fn default_queue_capacity() -> usize {
    100
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(s: &PoolSettings) -> Self {
        PoolConfig {
            workers: s.workers,
            queue_capacity: s.queue_capacity,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Expected processing time used to scale progress
    #[serde(default = "default_assumed_duration_secs")]
    pub assumed_duration_secs: u64,

    /// Seconds without output growth before a job counts as stalled
    #[serde(default = "default_stall_after_secs")]
    pub stall_after_secs: u64,

    #[serde(default = "default_stall_ramp_secs")]
    pub stall_ramp_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_assumed_duration_secs() -> u64 {
    30
}
fn default_stall_after_secs() -> u64 {
    5
}
fn default_stall_ramp_secs() -> u64 {
    60
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            assumed_duration_secs: default_assumed_duration_secs(),
            stall_after_secs: default_stall_after_secs(),
            stall_ramp_secs: default_stall_ramp_secs(),
        }
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(s: &MonitorSettings) -> Self {
        MonitorConfig {
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            assumed_duration: Duration::from_secs(s.assumed_duration_secs),
            stall_after: Duration::from_secs(s.stall_after_secs),
            stall_ramp: Duration::from_secs(s.stall_ramp_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSettings {
    /// Events buffered per subscriber before it is dropped
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_subscriber_buffer() -> usize {
    256
}
fn default_write_timeout_ms() -> u64 {
    5000
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl From<&EventSettings> for BroadcastConfig {
    fn from(s: &EventSettings) -> Self {
        BroadcastConfig {
            subscriber_buffer: s.subscriber_buffer,
            write_timeout: Duration::from_millis(s.write_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Directory used when a command does not name one
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./moshed")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}
