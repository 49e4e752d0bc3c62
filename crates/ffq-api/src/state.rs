//! Application state.

use std::sync::Arc;

use ffq_queue::TaskQueue;

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub queue: Arc<TaskQueue>,
}

impl AppState {
    /// Create new application state, verifying broker connectivity.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        let queue = TaskQueue::from_env()?;
        queue.ping().await?;

        Ok(Self {
            config,
            queue: Arc::new(queue),
        })
    }
}
