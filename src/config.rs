use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage::Region;

use crate::error::{C9Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub registry_port: u16,
    pub manager_port: u16,
    pub bucket_start_port: u16,
    pub bucket_count: usize,
    pub data_dir: PathBuf,
    pub manager_region: Region,
    pub bucket_capacity: i64,
    pub io_timeout_ms: u64,
    // Empty means the local registry only.
    pub registries: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            registry_port: 3000,
            manager_port: 8000,
            bucket_start_port: 3001,
            bucket_count: 3,
            data_dir: PathBuf::from(".data"),
            manager_region: Region::LatinAmerica,
            bucket_capacity: storage::DEFAULT_CAPACITY,
            io_timeout_ms: network::DEFAULT_IO_TIMEOUT_MS,
            registries: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(C9Error::InvalidConfig("host must not be empty".to_string()));
        }
        for (name, port) in [
            ("registry_port", self.registry_port),
            ("manager_port", self.manager_port),
            ("bucket_start_port", self.bucket_start_port),
        ] {
            if port == 0 {
                return Err(C9Error::InvalidConfig(format!("{} must not be 0", name)));
            }
        }
        if self.bucket_count == 0 {
            return Err(C9Error::InvalidConfig("bucket_count must be at least 1".to_string()));
        }
        if self.io_timeout_ms == 0 {
            return Err(C9Error::InvalidConfig("io_timeout_ms must not be 0".to_string()));
        }
        if self.bucket_capacity < 0 {
            return Err(C9Error::InvalidConfig("bucket_capacity must not be negative".to_string()));
        }
        self.registry_addresses()?;
        Ok(())
    }

    pub fn registry_addresses(&self) -> Result<Vec<(String, u16)>> {
        if self.registries.is_empty() {
            return Ok(vec![(self.host.clone(), self.registry_port)]);
        }

        self.registries
            .iter()
            .map(|address| parse_address(address))
            .collect()
    }

    pub fn bucket(&self, port: u16, region: Region) -> Result<storage::Config> {
        let mut config = storage::Config::new(self.host.clone(), port, region, self.data_dir.clone());
        config.capacity = self.bucket_capacity;
        config.registries = self.registry_addresses()?;
        config.io_timeout_ms = self.io_timeout_ms;
        Ok(config)
    }
}

fn parse_address(address: &str) -> Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| C9Error::InvalidConfig(format!("registry address {:?} has no port", address)))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| C9Error::InvalidConfig(format!("invalid registry port in {:?}: {}", address, e)))?;
    if host.is_empty() || port == 0 {
        return Err(C9Error::InvalidConfig(format!("invalid registry address {:?}", address)));
    }
    Ok((host.to_string(), port))
}

impl From<&Config> for network::Config {
    fn from(config: &Config) -> Self {
        network::Config {
            io_timeout_ms: config.io_timeout_ms,
        }
    }
}

impl From<&Config> for registry::Config {
    fn from(config: &Config) -> Self {
        registry::Config {
            host: config.host.clone(),
            port: config.registry_port,
            io_timeout_ms: config.io_timeout_ms,
        }
    }
}

impl From<&Config> for manager::Config {
    fn from(config: &Config) -> Self {
        manager::Config {
            host: config.host.clone(),
            port: config.manager_port,
            region: config.manager_region,
            io_timeout_ms: config.io_timeout_ms,
        }
    }
}
