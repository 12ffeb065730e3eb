use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{Result, StorageError};

pub const DEFAULT_CAPACITY: i64 = 250_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    UsEast,
    UsWest,
    Eu,
    Asia,
    LatinAmerica,
    Africa,
    Australia,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::UsEast,
        Region::UsWest,
        Region::Eu,
        Region::Asia,
        Region::LatinAmerica,
        Region::Africa,
        Region::Australia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::UsEast => "us-east",
            Region::UsWest => "us-west",
            Region::Eu => "eu",
            Region::Asia => "asia",
            Region::LatinAmerica => "latin-america",
            Region::Africa => "africa",
            Region::Australia => "australia",
        }
    }

    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Region::UsEast)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|region| region.as_str() == s)
            .ok_or_else(|| StorageError::Protocol(format!("unknown region: {}", s)))
    }
}

// `available_space` is a counter adjusted by PUT and DELETE, so it can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub files_count: u64,
    pub available_space: i64,
    pub used_space: u64,
}

impl BucketSpec {
    pub fn with_capacity(capacity: i64) -> Self {
        Self {
            files_count: 0,
            available_space: capacity,
            used_space: 0,
        }
    }

    pub fn parse_fields(files_count: &str, available_space: &str, used_space: &str) -> Result<Self> {
        Ok(Self {
            files_count: parse_field("files_count", files_count)?,
            available_space: parse_field("available_space", available_space)?,
            used_space: parse_field("used_space", used_space)?,
        })
    }
}

impl Default for BucketSpec {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for BucketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.files_count, self.available_space, self.used_space
        )
    }
}

impl FromStr for BucketSpec {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        match fields.as_slice() {
            [files_count, available_space, used_space] => {
                Self::parse_fields(files_count, available_space, used_space)
            }
            _ => Err(StorageError::Protocol(format!("malformed spec line: {:?}", s))),
        }
    }
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| StorageError::Protocol(format!("invalid {}: {:?}", name, value)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    NotFound,
    Error,
    InsufficientSpace,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Error => "ERROR",
            StatusCode::InsufficientSpace => "INSUFFICIENT_SPACE",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OK" => Ok(StatusCode::Ok),
            "NOT_FOUND" => Ok(StatusCode::NotFound),
            "ERROR" => Ok(StatusCode::Error),
            "INSUFFICIENT_SPACE" => Ok(StatusCode::InsufficientSpace),
            other => Err(StorageError::Protocol(format!("unknown status: {:?}", other))),
        }
    }
}
