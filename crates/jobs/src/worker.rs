//! Worker-side view of the queue and status records.
//!
//! Code execution itself happens outside this crate. [`QueueConsumer`] only
//! encodes the contract every worker follows: pop one work item at a time,
//! move the record to `running`, then write exactly one terminal status.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use wecode_core::job::{
    record_status, status_key, JobStatus, WorkItem, FIELD_ERROR, FIELD_OUTPUT, FIELD_STATUS,
};
use wecode_core::types::JobId;

use crate::error::JobsError;
use crate::store::JobStore;

/// Final result of executing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done { output: String },
    Error { message: String },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Done { .. } => JobStatus::Done,
            JobOutcome::Error { .. } => JobStatus::Error,
        }
    }
}

pub struct QueueConsumer {
    store: Arc<dyn JobStore>,
    queue: String,
}

impl QueueConsumer {
    pub fn new(store: Arc<dyn JobStore>, queue: impl Into<String>) -> Self {
        Self {
            store,
            queue: queue.into(),
        }
    }

    /// Pop the next decodable work item, waiting up to `timeout` in total.
    ///
    /// Entries that do not decode are dropped with a warning; they were
    /// already removed from the queue and cannot be returned to it.
    pub async fn next_job(&self, timeout: Duration) -> Result<Option<WorkItem>, JobsError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Once the deadline has passed, a zero wait still checks the
            // queue once.
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(raw) = self.store.pop(&self.queue, remaining).await? else {
                return Ok(None);
            };
            match WorkItem::decode(&raw) {
                Ok(item) => {
                    tracing::debug!(job_id = %item.job_id(), "Work item claimed");
                    return Ok(Some(item));
                }
                Err(e) => {
                    tracing::warn!(
                        queue = %self.queue,
                        error = %e,
                        raw_len = raw.len(),
                        "Skipping undecodable queue entry",
                    );
                }
            }
        }
    }

    pub async fn mark_running(&self, job_id: JobId) -> Result<(), JobsError> {
        let key = self.ensure_not_terminal(job_id).await?;
        self.store
            .put_fields(&key, &[(FIELD_STATUS, JobStatus::Running.as_str())])
            .await?;
        Ok(())
    }

    /// Write the terminal status for `job_id`.
    ///
    /// Refuses with [`JobsError::AlreadyTerminal`] if the record already
    /// holds `done` or `error`. The check and the write are separate store
    /// round trips, so two workers racing on the same job are not excluded
    /// here; the queue's single-pop guarantee is what prevents that.
    pub async fn finish(&self, job_id: JobId, outcome: JobOutcome) -> Result<(), JobsError> {
        let key = self.ensure_not_terminal(job_id).await?;
        let status = outcome.status().as_str();
        match &outcome {
            JobOutcome::Done { output } => {
                self.store
                    .put_fields(&key, &[(FIELD_STATUS, status), (FIELD_OUTPUT, output.as_str())])
                    .await?;
            }
            JobOutcome::Error { message } => {
                self.store
                    .put_fields(&key, &[(FIELD_STATUS, status), (FIELD_ERROR, message.as_str())])
                    .await?;
            }
        }
        tracing::info!(job_id = %job_id, status, "Job finished");
        Ok(())
    }

    async fn ensure_not_terminal(&self, job_id: JobId) -> Result<String, JobsError> {
        let id = job_id.to_string();
        let key = status_key(&id);
        let record = self.store.fields(&key).await?;
        if record_status(&record).is_some_and(JobStatus::is_terminal) {
            return Err(JobsError::AlreadyTerminal(id));
        }
        Ok(key)
    }
}
