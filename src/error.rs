use thiserror::Error;

#[derive(Error, Debug)]
pub enum C9Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] network::NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("Manager error: {0}")]
    Manager(#[from] manager::ManagerError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service stopped: {0}")]
    Stopped(String),
}

pub type Result<T> = std::result::Result<T, C9Error>;
