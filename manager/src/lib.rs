mod cache;
pub mod client;
mod handlers;
pub mod placement;
mod server;

pub use cache::BucketCache;
pub use client::CommandResult;
pub use handlers::{
    Context, DownloadHandler, Handler, HandlerRegistry, Parameters, Response, UploadHandler,
};
pub use placement::{distance, select_bucket, Selection};
pub use server::Manager;

use std::time::Duration;

use network::NetworkError;
use storage::{Region, StorageError};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub region: Region,
    pub io_timeout_ms: u64,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, region: Region) -> Self {
        Self {
            host: host.into(),
            port,
            region,
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

pub type Result<T> = std::result::Result<T, ManagerError>;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("No bucket has {required} bytes available")]
    NoBucketAvailable { required: u64 },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Bucket error: {0}")]
    Bucket(#[from] StorageError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
