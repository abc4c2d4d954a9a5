//! Job submission.
//!
//! A submission records an initial `pending` status and pushes a
//! [`WorkItem`] onto the shared queue. It never waits for execution.

use std::sync::Arc;

use wecode_core::job::{status_key, CodeSubmission, JobStatus, WorkItem, FIELD_STATUS};
use wecode_core::types::JobId;

use crate::error::JobsError;
use crate::store::JobStore;

pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    queue: String,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn JobStore>, queue: impl Into<String>) -> Self {
        Self {
            store,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Accept a submission and hand it to the worker pool.
    ///
    /// The status record is written before the queue push, so a poll issued
    /// right after this returns observes `pending`. If the push fails the
    /// record is left behind without a queue entry; no reconciliation is
    /// attempted and the caller gets the error instead of a job id.
    pub async fn submit(&self, submission: &CodeSubmission) -> Result<JobId, JobsError> {
        let job_id = JobId::generate();

        // Encode first: a payload that cannot be serialized never touches
        // the store.
        let payload = WorkItem::new(job_id, submission)
            .encode()
            .map_err(JobsError::Encode)?;

        let key = status_key(&job_id.to_string());
        self.store
            .put_fields(&key, &[(FIELD_STATUS, JobStatus::Pending.as_str())])
            .await?;

        let queue_len = match self.store.push(&self.queue, &payload).await {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    queue = %self.queue,
                    error = %e,
                    "Queue push failed; status record left without a queue entry",
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            job_id = %job_id,
            language = %submission.language,
            code_len = submission.code.len(),
            queue_len,
            "Job enqueued",
        );

        Ok(job_id)
    }
}
