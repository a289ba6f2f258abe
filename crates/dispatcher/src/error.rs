//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Worker thread could not be started
    #[error("failed to spawn worker for consumer '{name}': {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Queue full - sample set dropped
    #[error("queue full for consumer '{consumer}', sample set {sequence} dropped")]
    QueueFull { consumer: String, sequence: u64 },

    /// Consumer already shut down
    #[error("consumer '{0}' is closed")]
    Closed(String),
}

impl DispatcherError {
    /// Create a worker spawn error
    pub fn worker_spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::WorkerSpawn {
            name: name.into(),
            source,
        }
    }
}
