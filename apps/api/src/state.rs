use crate::config::Config;
use crate::jobs::manager::JobManager;
use crate::jobs::queue::JobQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Job store read by the status endpoint. Workers hold their own clone.
    pub jobs: JobManager,
    pub queue: JobQueue,
}
