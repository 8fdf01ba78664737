//! Output-growth progress estimation.
//!
//! The mutation engine reports nothing while it runs, so a monitor polls
//! the size of the output file and turns growth (or the lack of it) into a
//! heuristic progress value. Samples are advisory: the registry refuses
//! them once the job has left `processing`, and the worker stops the
//! monitor before it records the final state.

use crate::ids::JobId;
use crate::state::JobRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Estimates at or below this value are not published.
const MIN_PUBLISHED_PROGRESS: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between file size samples.
    pub poll_interval: Duration,
    /// Expected run time, used to scale progress while the file grows.
    pub assumed_duration: Duration,
    /// Time without growth after which the job counts as stalled.
    pub stall_after: Duration,
    /// Time over which the stalled estimate ramps up.
    pub stall_ramp: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            assumed_duration: Duration::from_secs(30),
            stall_after: Duration::from_secs(5),
            stall_ramp: Duration::from_secs(60),
        }
    }
}

/// One observation of the output file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Time since the monitor started.
    pub elapsed: Duration,
    /// Time since the file last grew (or since start if it never did).
    pub since_growth: Duration,
    /// Whether the file grew since the previous sample.
    pub grew: bool,
}

/// Progress estimate for a sample, if it warrants one.
///
/// Growing: `0.2 + 0.6 * elapsed / assumed_duration`, capped at 0.8.
/// Stalled for longer than `stall_after`: `0.3 + 0.4 * elapsed / stall_ramp`,
/// capped at 0.7.
pub fn estimate_progress(sample: &ProgressSample, config: &MonitorConfig) -> Option<f64> {
    let elapsed = sample.elapsed.as_secs_f64();

    if sample.grew {
        let assumed = config.assumed_duration.as_secs_f64().max(f64::EPSILON);
        Some((0.2 + 0.6 * elapsed / assumed).min(0.8))
    } else if sample.since_growth > config.stall_after {
        let ramp = config.stall_ramp.as_secs_f64().max(f64::EPSILON);
        Some((0.3 + (elapsed / ramp) * 0.4).min(0.7))
    } else {
        None
    }
}

/// Step text shown while a job runs.
pub fn step_text(size_bytes: u64) -> String {
    format!("Processing... ({:.1} MB)", size_bytes as f64 / 1024.0 / 1024.0)
}

pub struct ProgressMonitor;

impl ProgressMonitor {
    /// Start watching `path` on behalf of `job_id`.
    pub fn spawn(
        job_id: JobId,
        path: PathBuf,
        registry: Arc<JobRegistry>,
        config: MonitorConfig,
    ) -> MonitorHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(watch(job_id, path, registry, config, token.clone()));

        MonitorHandle {
            task: Some(task),
            _guard: token.drop_guard(),
        }
    }
}

/// Owner of a running monitor. Dropping it cancels the monitor.
pub struct MonitorHandle {
    task: Option<JoinHandle<()>>,
    _guard: DropGuard,
}

impl MonitorHandle {
    /// Cancel the monitor and wait until it has exited.
    ///
    /// Once this returns no further sample from this monitor can reach the
    /// registry.
    pub async fn stop(mut self) {
        let task = self.task.take();
        // Dropping the guard cancels the token.
        drop(self);
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Progress monitor ended abnormally: {}", e);
            }
        }
    }
}

async fn watch(
    job_id: JobId,
    path: PathBuf,
    registry: Arc<JobRegistry>,
    config: MonitorConfig,
    token: CancellationToken,
) {
    let start = Instant::now();
    let mut last_growth = start;
    let mut last_size = 0u64;

    let mut ticker = tokio::time::interval_at(start + config.poll_interval, config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::trace!("Monitoring {:?} for job {}", path, job_id);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Missing or unreadable files just skip this tick.
        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => continue,
        };

        let now = Instant::now();
        let grew = size > last_size;
        if grew {
            last_growth = now;
        }
        let sample = ProgressSample {
            elapsed: now - start,
            since_growth: now - last_growth,
            grew,
        };
        last_size = size;

        let Some(progress) = estimate_progress(&sample, &config) else {
            continue;
        };
        if progress <= MIN_PUBLISHED_PROGRESS || token.is_cancelled() {
            continue;
        }

        if let Err(e) = registry.update_progress(job_id, progress, &step_text(size)) {
            tracing::trace!("Dropping progress sample for job {}: {}", job_id, e);
        }
    }

    tracing::trace!("Monitor for job {} stopped", job_id);
}
