//! JSONL-based task queue with delayed retry.
//!
//! Append-only log: every job state change is a JSON line, current state
//! is derived by replaying the log. Retries are not synchronous — a failed
//! job is re-enqueued with a `run_after` in the future and picked up by a
//! worker once due.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

/// Errors from the task queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The two pipeline task kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Transcribe one audio unit
    Transcription,

    /// Summarize one catalog item
    Summarization,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcription => f.write_str("transcription"),
            Self::Summarization => f.write_str("summarization"),
        }
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker (possibly with a future `run_after`)
    Queued,

    /// Picked up by a worker
    Running,

    /// Finished successfully
    Done,

    /// Terminal failure (permanent error or retries exhausted)
    Failed,
}

/// An event in the queue log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// When this event occurred
    pub timestamp: DateTime<Utc>,

    /// The job this event belongs to
    pub job_id: Uuid,

    /// Type of queue event
    pub event_type: QueueEventType,

    /// Additional data (depends on event type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Types of queue events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventType {
    /// Job added to the queue
    Enqueued,

    /// A worker started the job
    Started,

    /// Job finished successfully
    Completed,

    /// Job failed retryably; re-queued with a delay
    RetryScheduled,

    /// Job failed terminally
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnqueuedData {
    kind: TaskKind,
    target: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct RetryData {
    run_after: DateTime<Utc>,
    attempt: u32,
    error: String,
}

/// A job with current state (derived from replaying events)
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job id
    pub id: Uuid,

    /// What to run
    pub kind: TaskKind,

    /// The audio unit or catalog item to run it on
    pub target: Uuid,

    /// Current status
    pub status: JobStatus,

    /// Retries scheduled so far (0 on the first execution)
    pub attempt: u32,

    /// Earliest time a worker may pick the job up
    pub run_after: DateTime<Utc>,

    /// When the job was first enqueued
    pub enqueued_at: DateTime<Utc>,

    /// Error message from the last failed execution
    pub error: Option<String>,
}

/// JSONL-backed task queue
pub struct TaskQueue {
    queue_path: PathBuf,
}

impl TaskQueue {
    /// Create a queue over the given log file
    pub fn new(queue_path: PathBuf) -> Self {
        Self { queue_path }
    }

    /// Open a queue, creating the parent directory if needed
    pub async fn open(queue_path: PathBuf) -> Result<Self, QueueError> {
        if let Some(parent) = queue_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(Self::new(queue_path))
    }

    /// Append an event to the queue log
    async fn append_event(&self, event: &QueueEvent) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.queue_path)
            .await?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events to build current state
    pub async fn replay(&self) -> Result<HashMap<Uuid, Job>, QueueError> {
        let mut jobs: HashMap<Uuid, Job> = HashMap::new();

        if !self.queue_path.exists() {
            return Ok(jobs);
        }

        let file = File::open(&self.queue_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: QueueEvent = serde_json::from_str(&line)?;
            Self::apply_event(&mut jobs, event);
        }

        Ok(jobs)
    }

    /// Apply a single event to the state
    fn apply_event(jobs: &mut HashMap<Uuid, Job>, event: QueueEvent) {
        match event.event_type {
            QueueEventType::Enqueued => {
                if let Some(data) = event.data {
                    if let Ok(data) = serde_json::from_value::<EnqueuedData>(data) {
                        jobs.insert(
                            event.job_id,
                            Job {
                                id: event.job_id,
                                kind: data.kind,
                                target: data.target,
                                status: JobStatus::Queued,
                                attempt: 0,
                                run_after: event.timestamp,
                                enqueued_at: event.timestamp,
                                error: None,
                            },
                        );
                    }
                }
            }
            QueueEventType::Started => {
                if let Some(job) = jobs.get_mut(&event.job_id) {
                    job.status = JobStatus::Running;
                }
            }
            QueueEventType::Completed => {
                if let Some(job) = jobs.get_mut(&event.job_id) {
                    job.status = JobStatus::Done;
                }
            }
            QueueEventType::RetryScheduled => {
                if let Some(job) = jobs.get_mut(&event.job_id) {
                    if let Some(data) = event.data {
                        if let Ok(data) = serde_json::from_value::<RetryData>(data) {
                            job.status = JobStatus::Queued;
                            job.attempt = data.attempt;
                            job.run_after = data.run_after;
                            job.error = Some(data.error);
                        }
                    }
                }
            }
            QueueEventType::Failed => {
                if let Some(job) = jobs.get_mut(&event.job_id) {
                    job.status = JobStatus::Failed;
                    if let Some(data) = event.data {
                        if let Some(error) = data.get("error").and_then(|e| e.as_str()) {
                            job.error = Some(error.to_string());
                        }
                    }
                }
            }
        }
    }

    /// Fire-and-forget trigger: queue transcription of an audio unit.
    /// Returns the accepted job id immediately.
    pub async fn enqueue_transcription(&self, unit_id: Uuid) -> Result<Uuid, QueueError> {
        self.enqueue(TaskKind::Transcription, unit_id).await
    }

    /// Fire-and-forget trigger: queue summarization of a catalog item.
    /// Returns the accepted job id immediately.
    pub async fn enqueue_summarization(&self, item_id: Uuid) -> Result<Uuid, QueueError> {
        self.enqueue(TaskKind::Summarization, item_id).await
    }

    async fn enqueue(&self, kind: TaskKind, target: Uuid) -> Result<Uuid, QueueError> {
        let job_id = Uuid::new_v4();
        let event = QueueEvent {
            timestamp: Utc::now(),
            job_id,
            event_type: QueueEventType::Enqueued,
            data: Some(serde_json::to_value(EnqueuedData { kind, target })?),
        };
        self.append_event(&event).await?;

        Ok(job_id)
    }

    /// Queued jobs whose `run_after` has passed, oldest first
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>, QueueError> {
        let jobs = self.replay().await?;
        let mut due: Vec<Job> = jobs
            .into_values()
            .filter(|job| job.status == JobStatus::Queued && job.run_after <= now)
            .collect();

        due.sort_by(|a, b| {
            a.run_after
                .cmp(&b.run_after)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });

        Ok(due)
    }

    /// Mark a job as picked up by a worker
    pub async fn mark_started(&self, id: Uuid) -> Result<(), QueueError> {
        let jobs = self.replay().await?;
        if !jobs.contains_key(&id) {
            return Err(QueueError::NotFound(id));
        }

        let event = QueueEvent {
            timestamp: Utc::now(),
            job_id: id,
            event_type: QueueEventType::Started,
            data: None,
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Mark a job as finished successfully
    pub async fn mark_completed(&self, id: Uuid) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            job_id: id,
            event_type: QueueEventType::Completed,
            data: None,
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Re-queue a failed job for a delayed retry
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: u32,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            job_id: id,
            event_type: QueueEventType::RetryScheduled,
            data: Some(serde_json::to_value(RetryData {
                run_after,
                attempt,
                error: error.to_string(),
            })?),
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Mark a job as terminally failed (the queue's failure log)
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            job_id: id,
            event_type: QueueEventType::Failed,
            data: Some(serde_json::json!({ "error": error })),
        };
        self.append_event(&event).await?;

        Ok(())
    }

    /// Get a specific job by id
    pub async fn get(&self, id: Uuid) -> Result<Option<Job>, QueueError> {
        let jobs = self.replay().await?;
        Ok(jobs.get(&id).cloned())
    }

    /// Get queue status summary
    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let jobs = self.replay().await?;

        let mut status = QueueStatus::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => status.queued += 1,
                JobStatus::Running => status.running += 1,
                JobStatus::Done => status.done += 1,
                JobStatus::Failed => status.failed += 1,
            }
        }

        // Most recently enqueued first
        let mut all_jobs: Vec<&Job> = jobs.values().collect();
        all_jobs.sort_by(|a, b| b.enqueued_at.cmp(&a.enqueued_at));
        status.recent = all_jobs.into_iter().take(5).cloned().collect();

        Ok(status)
    }
}

/// Queue status summary
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
    pub recent: Vec<Job>,
}

impl QueueStatus {
    /// Total jobs in the log
    pub fn total(&self) -> usize {
        self.queued + self.running + self.done + self.failed
    }
}
