//! Pipeline worker: drains due jobs and applies the retry policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::ai::{Summarizer, Transcriber};
use crate::store::{ArtifactStore, CatalogStore};

use super::error::TaskError;
use super::queue::{Job, QueueError, TaskKind, TaskQueue};
use super::summarize::run_summarization;
use super::transcribe::run_transcription;
use super::RetryPolicy;

/// A worker over the task queue.
///
/// Each invocation runs to completion on this worker with no internal
/// concurrency; running more workers (against the same queue home) is how
/// throughput scales. Cancellation mid-flight is not supported — once a
/// job is picked up it runs to success, retry scheduling, or terminal
/// failure.
pub struct Worker {
    store: Arc<CatalogStore>,
    artifacts: Arc<ArtifactStore>,
    queue: Arc<TaskQueue>,
    http: reqwest::Client,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryPolicy,
}

impl Worker {
    pub fn new(
        store: Arc<CatalogStore>,
        artifacts: Arc<ArtifactStore>,
        queue: Arc<TaskQueue>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            artifacts,
            queue,
            http: reqwest::Client::new(),
            transcriber,
            summarizer,
            retry,
        }
    }

    /// Drain all currently-due jobs once. Returns how many were executed.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let due = self.queue.due_jobs(Utc::now()).await?;
        let count = due.len();

        for job in due {
            self.execute(job).await?;
        }

        Ok(count)
    }

    /// Run forever, polling for due jobs
    pub async fn run(&self, poll: Duration) -> Result<(), QueueError> {
        info!(poll_secs = poll.as_secs(), "worker started");

        loop {
            let executed = self.run_once().await?;
            if executed == 0 {
                tokio::time::sleep(poll).await;
            }
        }
    }

    /// Execute one job and record its outcome in the queue
    async fn execute(&self, job: Job) -> Result<(), QueueError> {
        self.queue.mark_started(job.id).await?;
        info!(job_id = %job.id, kind = %job.kind, target = %job.target, attempt = job.attempt, "job started");

        let result: Result<String, TaskError> = match job.kind {
            TaskKind::Transcription => run_transcription(
                &self.store,
                &self.artifacts,
                &self.http,
                self.transcriber.as_ref(),
                job.target,
                job.attempt,
            )
            .await
            .map(|outcome| outcome.to_string()),
            TaskKind::Summarization => run_summarization(
                &self.store,
                &self.artifacts,
                self.summarizer.as_ref(),
                job.target,
                job.attempt,
            )
            .await
            .map(|outcome| outcome.to_string()),
        };

        match result {
            Ok(outcome) => {
                info!(job_id = %job.id, %outcome, "job completed");
                self.queue.mark_completed(job.id).await
            }
            Err(err) if err.is_retryable() && job.attempt < self.retry.max_retries => {
                let attempt = job.attempt + 1;
                let run_after = Utc::now() + self.retry.delay();
                warn!(
                    job_id = %job.id,
                    attempt,
                    max_retries = self.retry.max_retries,
                    error = %err,
                    "job failed, retry scheduled"
                );
                self.queue
                    .schedule_retry(job.id, attempt, run_after, &err.to_string())
                    .await
            }
            Err(err) => {
                error!(
                    job_id = %job.id,
                    executions = job.attempt + 1,
                    error = %err,
                    "job failed permanently"
                );
                self.queue.mark_failed(job.id, &err.to_string()).await
            }
        }
    }
}
