use crate::effects::Effect;
use crate::ids::JobId;
use chrono::{DateTime, Utc};
use moshforged_riff::MoshParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress reported when a worker picks a job up.
pub const START_PROGRESS: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_path: PathBuf,
    pub effect: Effect,
    pub params: MoshParams,
    pub status: JobStatus,
    pub progress: f64,
    pub current_step: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal step of `queued -> processing -> {completed|failed}`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output file of a job: `{output_dir}/moshed_{id}.avi`.
pub fn output_path_for(output_dir: &Path, id: JobId) -> PathBuf {
    output_dir.join(format!("moshed_{}.avi", id))
}

impl Job {
    pub fn new(input_path: PathBuf, output_dir: PathBuf, effect: Effect, params: MoshParams) -> Self {
        let id = JobId::new();
        Self {
            id,
            output_path: output_path_for(&output_dir, id),
            input_path,
            output_dir,
            effect,
            params,
            status: JobStatus::Queued,
            progress: 0.0,
            current_step: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = START_PROGRESS;
        self.current_step = Some("Starting".to_string());
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn update_progress(&mut self, progress: f64, step: &str) {
        self.progress = progress.clamp(0.0, 1.0);
        self.current_step = Some(step.to_string());
    }

    pub(crate) fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.current_step = None;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: &str) {
        self.status = JobStatus::Failed;
        self.progress = 0.0;
        self.current_step = None;
        self.error = Some(if error.is_empty() {
            "unknown error".to_string()
        } else {
            error.to_string()
        });
        self.completed_at = Some(Utc::now());
    }
}

/// Change requested through [`super::JobRegistry::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Start,
    Progress { progress: f64, step: String },
    Complete { bytes_written: u64 },
    Fail { error: String },
}

impl JobUpdate {
    /// Status the job holds after the update.
    pub fn target_status(&self) -> JobStatus {
        match self {
            JobUpdate::Start | JobUpdate::Progress { .. } => JobStatus::Processing,
            JobUpdate::Complete { .. } => JobStatus::Completed,
            JobUpdate::Fail { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JobStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_bytes_written: u64,
}

impl JobStats {
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            return 0.0;
        }
        (self.completed as f64 / finished as f64) * 100.0
    }
}
