mod connection;
mod listener;

pub use connection::{pad_chunk, Connection};
pub use listener::Listener;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Manager protocol header frame.
pub const CHUNK_SIZE: usize = 1024;

pub const MAX_LINE_LENGTH: usize = 64 * 1024;

pub const DEFAULT_IO_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    NotFound,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OK" => Ok(Status::Ok),
            "ERROR" => Ok(Status::Error),
            "NOT_FOUND" => Ok(Status::NotFound),
            other => Err(NetworkError::Protocol(format!("unknown status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    NoContent,
    TextPlain,
    Bytes,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::NoContent => "no-content",
            ContentType::TextPlain => "text/plain",
            ContentType::Bytes => "application/bytes",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no-content" => Ok(ContentType::NoContent),
            "text/plain" => Ok(ContentType::TextPlain),
            "application/bytes" => Ok(ContentType::Bytes),
            other => Err(NetworkError::Protocol(format!("unknown content type: {}", other))),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Chunk too large: {len} bytes exceeds {max}")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("Invalid text encoding: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub io_timeout_ms: u64,
}

impl Config {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [Status::Ok, Status::Error, Status::NotFound] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert_eq!(Status::NotFound.to_string(), "NOT_FOUND");
        assert!("INSUFFICIENT_SPACE".parse::<Status>().is_err());
    }

    #[test]
    fn test_content_type_wire_names() {
        assert_eq!(ContentType::NoContent.as_str(), "no-content");
        assert_eq!(ContentType::TextPlain.as_str(), "text/plain");
        assert_eq!(
            "application/bytes".parse::<ContentType>().unwrap(),
            ContentType::Bytes
        );
        assert!("application/json".parse::<ContentType>().is_err());
    }
}
