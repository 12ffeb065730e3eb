mod event;
mod subject;

pub use event::RegistryEvent;
pub use subject::Subject;

use std::time::Duration;

use async_trait::async_trait;
use network::NetworkError;
use storage::{BucketHandle, BucketSpec, StorageError};

// Callbacks run on the registry accept loop, one event at a time.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn registered(&self, bucket: BucketHandle);

    async fn unregistered(&self, id: &str);

    async fn updated(&self, id: &str, spec: BucketSpec);
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub io_timeout_ms: u64,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            io_timeout_ms: network::DEFAULT_IO_TIMEOUT_MS,
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] StorageError),
}
