use std::sync::Arc;

use wecode_jobs::{JobDispatcher, JobStatusReader, JobStore};
use wecode_relay::{Publisher, RoomRelay, TopicBroker};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Backing store, kept for the health check.
    pub store: Arc<dyn JobStore>,
    pub dispatcher: Arc<JobDispatcher>,
    pub status_reader: Arc<JobStatusReader>,
    /// Topic subscriptions of every STOMP session.
    pub broker: Arc<TopicBroker>,
    pub relay: Arc<RoomRelay>,
    /// WebSocket connection manager (heartbeat + shutdown).
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Wire every component on top of `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn JobStore>) -> Self {
        let dispatcher = JobDispatcher::new(Arc::clone(&store), config.job_queue.clone());
        let status_reader = JobStatusReader::new(Arc::clone(&store));
        let broker = Arc::new(TopicBroker::new());
        let publisher: Arc<dyn Publisher> = broker.clone();

        Self {
            config: Arc::new(config),
            store,
            dispatcher: Arc::new(dispatcher),
            status_reader: Arc::new(status_reader),
            broker,
            relay: Arc::new(RoomRelay::new(publisher)),
            ws_manager: Arc::new(WsManager::new()),
        }
    }
}
