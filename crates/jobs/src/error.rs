/// Failures talking to the shared job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the dispatcher, status reader and queue consumer.
#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Failed to encode work item: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Job {0} already reached a terminal status")]
    AlreadyTerminal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
