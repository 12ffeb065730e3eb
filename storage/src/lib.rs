mod announce;
mod handle;
mod model;
mod object;
mod server;

pub use announce::Announcement;
pub use handle::BucketHandle;
pub use model::{BucketSpec, Region, StatusCode, DEFAULT_CAPACITY};
pub use object::File;
pub use server::{directory_size, BucketServer};

use std::path::PathBuf;
use std::time::Duration;

use network::NetworkError;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub region: Region,
    pub base_path: PathBuf,
    pub capacity: i64,
    pub registries: Vec<(String, u16)>,
    pub io_timeout_ms: u64,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, region: Region, base_path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            region,
            base_path: base_path.into(),
            capacity: DEFAULT_CAPACITY,
            registries: Vec::new(),
            io_timeout_ms: network::DEFAULT_IO_TIMEOUT_MS,
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Insufficient space: {required} bytes requested, {available} available")]
    InsufficientSpace { required: u64, available: i64 },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Bucket error: {0}")]
    Remote(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
