//! Job model shared between the dispatcher and the external worker pool.
//!
//! The status record layout and the queue wire format defined here are an
//! externally visible schema: any worker implementation reads and writes
//! exactly these keys and fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Default name of the shared queue work items are pushed onto.
pub const DEFAULT_QUEUE: &str = "code-queue";

/// Prefix of the per-job status record key.
pub const STATUS_KEY_PREFIX: &str = "job:";

pub const FIELD_STATUS: &str = "status";
pub const FIELD_OUTPUT: &str = "output";
pub const FIELD_ERROR: &str = "error";

/// Full field set of a job's status record.
///
/// Flat string map; an empty map means the record does not exist.
pub type StatusRecord = BTreeMap<String, String>;

/// Store key holding the status record for `job_id`.
pub fn status_key(job_id: &str) -> String {
    format!("{STATUS_KEY_PREFIX}{job_id}")
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a job.
///
/// The dispatcher only ever writes `Pending`; every later transition is
/// owned by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// `Done` and `Error` are final; no transition may follow them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            // Older workers report success as "completed".
            "done" | "completed" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(CoreError::Validation(format!(
                "unknown job status '{other}'"
            ))),
        }
    }
}

/// Parse the `status` field out of a status record, if present and known.
pub fn record_status(record: &StatusRecord) -> Option<JobStatus> {
    record.get(FIELD_STATUS).and_then(|s| s.parse().ok())
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Body of a code submission request.
///
/// Both fields are opaque to this layer; the worker decides whether the
/// language is supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSubmission {
    pub code: String,
    pub language: String,
}

/// Body returned after a submission has been accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// A unit of work handed from the dispatcher to a worker via the queue.
///
/// Internally tagged by `version` so new revisions can be introduced
/// without breaking workers that only understand older ones. Fields are
/// camelCase on the wire: `{"version":"1","jobId":..,"code":..,"language":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum WorkItem {
    #[serde(rename = "1")]
    V1(WorkItemV1),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemV1 {
    pub job_id: JobId,
    pub code: String,
    pub language: String,
    pub submitted_at: Timestamp,
}

impl WorkItem {
    /// Build a current-version work item for a fresh submission.
    pub fn new(job_id: JobId, submission: &CodeSubmission) -> Self {
        WorkItem::V1(WorkItemV1 {
            job_id,
            code: submission.code.clone(),
            language: submission.language.clone(),
            submitted_at: chrono::Utc::now(),
        })
    }

    pub fn job_id(&self) -> JobId {
        match self {
            WorkItem::V1(item) => item.job_id,
        }
    }

    pub fn language(&self) -> &str {
        match self {
            WorkItem::V1(item) => &item.language,
        }
    }

    /// Encode into the queue wire format.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a queue entry.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
