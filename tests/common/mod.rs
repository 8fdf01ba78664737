//! Shared test harness for integration tests.
//!
//! Provides synthetic AVI files built with [`RiffBuilder`] and a
//! [`TestHarness`] that wires a registry, broadcaster and worker pool around
//! any [`JobRunner`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moshforged::events::{BroadcastConfig, Broadcaster};
use moshforged::ids::JobId;
use moshforged::monitor::MonitorConfig;
use moshforged::processor::{EffectRunner, JobRunner, PoolConfig, WorkerPool};
use moshforged::state::{Job, JobRegistry};
use moshforged_riff::riff::FourCc;
use moshforged_riff::RiffBuilder;

/// A small AVI with `fragments` video chunks interleaved with audio.
///
/// Video payloads are `payload_len` bytes starting with an Annex-B start code.
pub fn sample_avi(fragments: usize, payload_len: usize) -> Vec<u8> {
    RiffBuilder::new()
        .list(FourCc::HDRL, |l| {
            l.chunk(b"avih", &[0u8; 56])
                .list(FourCc::STRL, |s| s.chunk(b"strh", &[0u8; 56]))
        })
        .list(FourCc::MOVI, |mut l| {
            for i in 0..fragments {
                let mut payload = vec![i as u8; payload_len];
                if payload_len >= 5 {
                    payload[..4].copy_from_slice(&[0, 0, 0, 1]);
                    payload[4] = if i == 0 { 0x65 } else { 0x41 };
                }
                l = l.chunk(b"00dc", &payload).chunk(b"01wb", &[0xAA; 8]);
            }
            l
        })
        .chunk(b"idx1", &[0u8; 16])
        .finish()
}

/// Write [`sample_avi`] into `dir` and return its path.
pub fn write_sample(dir: &Path, name: &str, fragments: usize, payload_len: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_avi(fragments, payload_len)).expect("failed to write sample");
    path
}

/// Monitor settings that sample quickly enough for tests.
pub fn fast_monitor() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(10),
        assumed_duration: Duration::from_secs(1),
        stall_after: Duration::from_millis(50),
        stall_ramp: Duration::from_secs(1),
    }
}

/// Registry plus pool, sharing one broadcaster.
pub struct TestHarness {
    pub registry: Arc<JobRegistry>,
    pub pool: WorkerPool,
}

impl TestHarness {
    /// Harness running the real effects.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_runner(config, fast_monitor(), Arc::new(EffectRunner))
    }

    pub fn with_runner(
        config: PoolConfig,
        monitor: MonitorConfig,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new(Broadcaster::new(
            BroadcastConfig::default(),
        )));
        let pool = WorkerPool::new(config, monitor, registry.clone(), runner);
        Self { registry, pool }
    }

    pub fn events(&self) -> &Broadcaster {
        self.registry.events()
    }

    pub fn job(&self, id: JobId) -> Job {
        self.registry.get(id).expect("job not registered")
    }

    /// Wait until every job in `ids` is terminal.
    pub async fn wait_for(&self, ids: &[JobId]) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if ids.iter().all(|id| self.job(*id).status.is_terminal()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("jobs did not finish in time");
    }
}
