//! Job status lookup.

use std::sync::Arc;

use wecode_core::job::{status_key, StatusRecord};

use crate::error::JobsError;
use crate::store::JobStore;

/// Read-only view over job status records.
///
/// Lookups have no side effects and never wait for a job to finish;
/// callers poll at whatever interval suits them.
pub struct JobStatusReader {
    store: Arc<dyn JobStore>,
}

impl JobStatusReader {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Return the full field set for `job_id`, or [`JobsError::NotFound`].
    ///
    /// Any string is accepted as an id; ids that were never issued simply
    /// have no record.
    pub async fn get_status(&self, job_id: &str) -> Result<StatusRecord, JobsError> {
        let record = self.store.fields(&status_key(job_id)).await?;
        if record.is_empty() {
            return Err(JobsError::NotFound(job_id.to_string()));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use wecode_core::job::CodeSubmission;

    use super::*;
    use crate::dispatcher::JobDispatcher;
    use crate::store::memory::MemoryJobStore;

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let reader = JobStatusReader::new(Arc::new(MemoryJobStore::new()));
        assert_matches!(
            reader.get_status("nonexistent-id").await,
            Err(JobsError::NotFound(id)) if id == "nonexistent-id"
        );
    }

    #[tokio::test]
    async fn reflects_worker_writes() {
        let store = Arc::new(MemoryJobStore::new());
        let dispatcher = JobDispatcher::new(store.clone(), "q");
        let reader = JobStatusReader::new(store.clone());

        let job_id = dispatcher
            .submit(&CodeSubmission {
                code: "print(1)".into(),
                language: "python".into(),
            })
            .await
            .unwrap()
            .to_string();

        let pending = reader.get_status(&job_id).await.unwrap();
        assert_eq!(pending, StatusRecord::from([("status".into(), "pending".into())]));

        store
            .put_fields(&status_key(&job_id), &[("status", "done"), ("output", "1")])
            .await
            .unwrap();

        let done = reader.get_status(&job_id).await.unwrap();
        assert_eq!(
            done,
            StatusRecord::from([
                ("output".into(), "1".into()),
                ("status".into(), "done".into()),
            ])
        );
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let store = Arc::new(MemoryJobStore::new());
        store.put_fields("job:j", &[("status", "running")]).await.unwrap();
        let reader = JobStatusReader::new(store);

        let first = reader.get_status("j").await.unwrap();
        let second = reader.get_status("j").await.unwrap();
        assert_eq!(first, second);
    }
}
