pub mod config;
pub mod error;
pub mod node;

pub use config::Config;
pub use error::{C9Error, Result};
pub use node::{create_buckets, run_buckets, ManagerNode};

// Re-export key types from workspace crates
pub use manager;
pub use network;
pub use registry;
pub use storage;
