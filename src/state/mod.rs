//! Job registry.
//!
//! [`JobRegistry`] is the single source of truth for job records. Records
//! live in a sharded [`DashMap`], so updates to different jobs do not
//! contend and readers always see whole records. Every applied change is
//! published to the [`Broadcaster`] while the record is still locked, which
//! keeps each job's events in transition order.

mod types;

pub use types::*;

use crate::events::{Broadcaster, JobEvent};
use crate::ids::JobId;
use dashmap::DashMap;
use parking_lot::RwLock;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UpdateError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

pub struct JobRegistry {
    jobs: DashMap<JobId, Job>,
    events: Broadcaster,
    stats: RwLock<JobStats>,
}

impl JobRegistry {
    pub fn new(events: Broadcaster) -> Self {
        Self {
            jobs: DashMap::new(),
            events,
            stats: RwLock::new(JobStats::default()),
        }
    }

    pub fn events(&self) -> &Broadcaster {
        &self.events
    }

    /// Register a new job and announce it.
    pub fn insert(&self, job: Job) {
        let id = job.id;
        let event = event_for(&job);
        self.jobs.insert(id, job);
        self.stats.write().submitted += 1;
        self.events.publish(event);
        tracing::debug!("Job {} registered", id);
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|job| job.clone())
    }

    /// Snapshot of every job, oldest first.
    pub fn get_all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stats(&self) -> JobStats {
        self.stats.read().clone()
    }

    /// Apply a state change, enforcing `queued -> processing -> {completed|failed}`.
    ///
    /// Progress updates are only accepted while the job is processing, so
    /// nothing can overwrite a terminal record.
    pub fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, UpdateError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(UpdateError::NotFound(id))?;
        let job = entry.value_mut();

        let from = job.status;
        let to = update.target_status();
        let allowed = match update {
            JobUpdate::Progress { .. } => from == JobStatus::Processing,
            _ => from.can_transition_to(to),
        };
        if !allowed {
            return Err(UpdateError::InvalidTransition { id, from, to });
        }

        match update {
            JobUpdate::Start => job.start(),
            JobUpdate::Progress { progress, ref step } => job.update_progress(progress, step),
            JobUpdate::Complete { bytes_written } => {
                job.complete();
                let mut stats = self.stats.write();
                stats.completed += 1;
                stats.total_bytes_written += bytes_written;
            }
            JobUpdate::Fail { ref error } => {
                job.fail(error);
                self.stats.write().failed += 1;
            }
        }

        self.events.publish(event_for(job));
        Ok(job.clone())
    }

    /// Shorthand for a [`JobUpdate::Progress`].
    pub fn update_progress(&self, id: JobId, progress: f64, step: &str) -> Result<Job, UpdateError> {
        self.update(
            id,
            JobUpdate::Progress {
                progress,
                step: step.to_string(),
            },
        )
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(Broadcaster::default())
    }
}

fn event_for(job: &Job) -> JobEvent {
    JobEvent::new(
        job.id,
        job.status,
        job.progress,
        job.current_step.clone(),
        job.error.clone(),
    )
}
