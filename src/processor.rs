//! Bounded worker pool.
//!
//! Submissions wait for a free slot in a bounded queue before the job is
//! registered, so a full queue pushes back on the caller instead of
//! growing without limit. A fixed set of workers share the receiving end;
//! each runs one job to completion before taking the next.

use crate::effects::Effect;
use crate::ids::JobId;
use crate::monitor::{MonitorConfig, ProgressMonitor};
use crate::state::{Job, JobRegistry, JobUpdate};
use anyhow::Context;
use async_trait::async_trait;
use moshforged_riff::MoshParams;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Jobs that may wait in the queue before `submit` blocks.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Worker pool is shut down")]
    Closed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// A request to run one effect on one file.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub effect: Effect,
    pub params: MoshParams,
}

impl SubmitRequest {
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, effect: Effect) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            effect,
            params: MoshParams::default(),
        }
    }

    pub fn with_params(mut self, params: MoshParams) -> Self {
        self.params = params;
        self
    }
}

/// Executes a job, returning the number of bytes written.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: &Job) -> anyhow::Result<u64>;
}

/// Runs the job's effect on a blocking thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectRunner;

#[async_trait]
impl JobRunner for EffectRunner {
    async fn run(&self, job: &Job) -> anyhow::Result<u64> {
        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", job.output_dir))?;

        let effect = job.effect;
        let input = job.input_path.clone();
        let output = job.output_path.clone();
        let params = job.params;

        let written = tokio::task::spawn_blocking(move || effect.apply(&input, &output, &params))
            .await
            .context("Effect task failed")??;
        Ok(written)
    }
}

pub struct WorkerPool {
    config: PoolConfig,
    monitor: MonitorConfig,
    registry: Arc<JobRegistry>,
    runner: Arc<dyn JobRunner>,
    tx: Mutex<Option<mpsc::Sender<JobId>>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<JobId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        config: PoolConfig,
        monitor: MonitorConfig,
        registry: Arc<JobRegistry>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        Self {
            config,
            monitor,
            registry,
            runner,
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Pool running [`EffectRunner`].
    pub fn with_effects(config: PoolConfig, monitor: MonitorConfig, registry: Arc<JobRegistry>) -> Self {
        Self::new(config, monitor, registry, Arc::new(EffectRunner))
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Spawn the workers. Calling this more than once has no effect.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }

        let count = self.config.workers.max(1);
        for index in 0..count {
            workers.push(tokio::spawn(worker_loop(
                index,
                self.rx.clone(),
                self.registry.clone(),
                self.runner.clone(),
                self.monitor.clone(),
            )));
        }
        tracing::info!(
            "Worker pool started with {} workers (queue capacity {})",
            count,
            self.config.queue_capacity
        );
    }

    /// Queue a job, waiting for a free slot if the queue is full.
    ///
    /// The job is registered as `queued` only once a slot is reserved.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, SubmitError> {
        if request.input_path.as_os_str().is_empty() {
            return Err(SubmitError::InvalidRequest("input path is empty".into()));
        }
        if request.output_dir.as_os_str().is_empty() {
            return Err(SubmitError::InvalidRequest("output directory is empty".into()));
        }

        let tx = self.tx.lock().clone().ok_or(SubmitError::Closed)?;
        let permit = tx.reserve().await.map_err(|_| SubmitError::Closed)?;

        let mut params = request.params;
        if params.seed.is_none() {
            params.seed = Some(rand::random());
        }

        let job = Job::new(request.input_path, request.output_dir, request.effect, params);
        let id = job.id;
        tracing::info!("Queued job {} ({} on {:?})", id, job.effect, job.input_path);

        self.registry.insert(job);
        permit.send(id);
        Ok(id)
    }

    /// Submit one job per preset of `effect`.
    pub async fn submit_batch(
        &self,
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        effect: Effect,
    ) -> Result<Vec<JobId>, SubmitError> {
        let input_path = input_path.into();
        let output_dir = output_dir.into();

        let mut ids = Vec::new();
        for params in effect.presets() {
            let request = SubmitRequest::new(input_path.clone(), output_dir.clone(), effect)
                .with_params(params);
            ids.push(self.submit(request).await?);
        }
        Ok(ids)
    }

    /// Stop accepting jobs, let the workers drain the queue, and wait for them.
    pub async fn shutdown(&self) {
        self.tx.lock().take();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker ended abnormally: {}", e);
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn worker_loop(
    index: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<JobId>>>,
    registry: Arc<JobRegistry>,
    runner: Arc<dyn JobRunner>,
    monitor: MonitorConfig,
) {
    tracing::debug!("Worker {} started", index);

    loop {
        let next = rx.lock().await.recv().await;
        let Some(id) = next else {
            break;
        };
        process_job(id, &registry, &runner, &monitor).await;
    }

    tracing::debug!("Worker {} stopped", index);
}

async fn process_job(
    id: JobId,
    registry: &Arc<JobRegistry>,
    runner: &Arc<dyn JobRunner>,
    monitor: &MonitorConfig,
) {
    let job = match registry.update(id, JobUpdate::Start) {
        Ok(job) => job,
        Err(e) => {
            tracing::warn!("Skipping job {}: {}", id, e);
            return;
        }
    };

    tracing::info!("Processing job {}: {}", id, job.file_name());

    let handle = ProgressMonitor::spawn(
        id,
        job.output_path.clone(),
        registry.clone(),
        monitor.clone(),
    );

    let task_runner = runner.clone();
    let result = tokio::spawn(async move { task_runner.run(&job).await }).await;

    // The final state must land after the last monitor sample.
    handle.stop().await;

    let update = match result {
        Ok(Ok(bytes_written)) => {
            tracing::info!("Job {} completed ({} bytes)", id, bytes_written);
            JobUpdate::Complete { bytes_written }
        }
        Ok(Err(e)) => {
            let error = format!("{:#}", e);
            tracing::error!("Job {} failed: {}", id, error);
            JobUpdate::Fail { error }
        }
        Err(e) => {
            let error = if e.is_panic() {
                format!("Job panicked: {}", panic_message(e.into_panic()))
            } else {
                "Job was cancelled".to_string()
            };
            tracing::error!("Job {} failed: {}", id, error);
            JobUpdate::Fail { error }
        }
    };

    if let Err(e) = registry.update(id, update) {
        tracing::error!("Could not record final state of job {}: {}", id, e);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobStatus;
    use assert_matches::assert_matches;
    use std::time::Duration;

    struct OkRunner;

    #[async_trait]
    impl JobRunner for OkRunner {
        async fn run(&self, _job: &Job) -> anyhow::Result<u64> {
            Ok(7)
        }
    }

    fn pool(config: PoolConfig) -> WorkerPool {
        WorkerPool::new(
            config,
            MonitorConfig::default(),
            Arc::new(JobRegistry::default()),
            Arc::new(OkRunner),
        )
    }

    #[tokio::test]
    async fn test_submit_registers_queued_job_with_seed() {
        let pool = pool(PoolConfig::default());
        let id = pool
            .submit(SubmitRequest::new("/in.avi", "/out", Effect::Mosh))
            .await
            .unwrap();

        let job = pool.registry().get(id).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.params.seed.is_some());
        assert_eq!(job.output_path, PathBuf::from(format!("/out/moshed_{}.avi", id)));
    }

    #[tokio::test]
    async fn test_empty_paths_rejected() {
        let pool = pool(PoolConfig::default());
        assert_matches!(
            pool.submit(SubmitRequest::new("", "/out", Effect::Mosh)).await,
            Err(SubmitError::InvalidRequest(_))
        );
        assert!(pool.registry().is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let pool = pool(PoolConfig::default());
        pool.start();
        pool.shutdown().await;
        assert_matches!(
            pool.submit(SubmitRequest::new("/in.avi", "/out", Effect::Mosh)).await,
            Err(SubmitError::Closed)
        );
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let pool = pool(PoolConfig {
            workers: 2,
            queue_capacity: 8,
        });
        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(
                pool.submit(SubmitRequest::new("/in.avi", "/out", Effect::Mosh))
                    .await
                    .unwrap(),
            );
        }
        pool.start();
        pool.start();
        tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
            .await
            .unwrap();

        for id in ids {
            let job = pool.registry().get(id).unwrap();
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.progress, 1.0);
        }
        assert_eq!(pool.registry().stats().total_bytes_written, 42);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(3u8)), "unknown panic");
    }
}
