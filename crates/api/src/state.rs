use std::sync::Arc;

use ffbuilder_events::EventBroadcaster;
use ffbuilder_worker::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Starts, stops, and lists conversion jobs.
    pub runner: Arc<JobRunner>,
    /// Fan-out hub feeding every WebSocket observer.
    pub broadcaster: Arc<EventBroadcaster>,
}
