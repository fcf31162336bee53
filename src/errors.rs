//! Error types for the resource pool

use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Queue capacity must be a power of two and at least 2, got {0}")]
    InvalidCapacity(usize),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to connect resource during pool warm-up: {0}")]
    Connect(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("Failed to start maintenance thread: {0}")]
    Maintenance(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl PoolError {
    pub(crate) fn connect<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PoolError::Connect(Arc::new(error))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
