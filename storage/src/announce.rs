use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{BucketSpec, Region, Result, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    Register {
        id: String,
        host: String,
        port: u16,
        region: Region,
        path: PathBuf,
        spec: BucketSpec,
    },
    Unregister {
        id: String,
    },
    Update {
        id: String,
        spec: BucketSpec,
    },
}

impl Announcement {
    pub fn id(&self) -> &str {
        match self {
            Announcement::Register { id, .. } => id,
            Announcement::Unregister { id } => id,
            Announcement::Update { id, .. } => id,
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Announcement::Register { .. } => "register",
            Announcement::Unregister { .. } => "unregister",
            Announcement::Update { .. } => "update",
        }
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::Register {
                id,
                host,
                port,
                region,
                path,
                spec,
            } => write!(
                f,
                "register {} {} {} {} {} {}",
                id,
                host,
                port,
                region,
                path.display(),
                spec
            ),
            Announcement::Unregister { id } => write!(f, "unregister {}", id),
            Announcement::Update { id, spec } => write!(f, "update {} {}", id, spec),
        }
    }
}

impl FromStr for Announcement {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();

        match fields.as_slice() {
            ["register", id, host, port, region, path, files_count, available_space, used_space] => {
                Ok(Announcement::Register {
                    id: id.to_string(),
                    host: host.to_string(),
                    port: port
                        .parse()
                        .map_err(|_| StorageError::Protocol(format!("invalid port: {:?}", port)))?,
                    region: region.parse()?,
                    path: PathBuf::from(*path),
                    spec: BucketSpec::parse_fields(files_count, available_space, used_space)?,
                })
            }
            ["unregister", id] => Ok(Announcement::Unregister { id: id.to_string() }),
            ["update", id, files_count, available_space, used_space] => Ok(Announcement::Update {
                id: id.to_string(),
                spec: BucketSpec::parse_fields(files_count, available_space, used_space)?,
            }),
            [] => Err(StorageError::Protocol("empty announcement".to_string())),
            [command, ..] => Err(StorageError::Protocol(format!(
                "malformed {} announcement: {:?}",
                command, s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> BucketSpec {
        BucketSpec {
            files_count: 3,
            available_space: 249_000_000,
            used_space: 1_000_000,
        }
    }

    #[test]
    fn test_register_line() {
        let announcement = Announcement::Register {
            id: "b-1".to_string(),
            host: "localhost".to_string(),
            port: 3001,
            region: Region::Eu,
            path: PathBuf::from("/data/b-1"),
            spec: spec(),
        };

        let line = announcement.to_string();
        assert_eq!(line, "register b-1 localhost 3001 eu /data/b-1 3 249000000 1000000");
        assert_eq!(line.parse::<Announcement>().unwrap(), announcement);
    }

    #[test]
    fn test_update_and_unregister_lines() {
        let update: Announcement = "update b-2 3 249000000 1000000".parse().unwrap();
        assert_eq!(
            update,
            Announcement::Update {
                id: "b-2".to_string(),
                spec: spec()
            }
        );
        assert_eq!(update.command(), "update");

        let unregister: Announcement = "unregister b-2".parse().unwrap();
        assert_eq!(unregister.id(), "b-2");
        assert_eq!(unregister.to_string(), "unregister b-2");
    }

    #[test]
    fn test_rejects_malformed_announcements() {
        for line in [
            "",
            "register b-1 localhost 3001 eu /data",
            "register b-1 localhost port eu /data 0 1 0",
            "register b-1 localhost 3001 mars /data 0 1 0",
            "update b-1 0 1",
            "unregister",
            "hello b-1",
        ] {
            assert!(line.parse::<Announcement>().is_err(), "{:?} should fail", line);
        }
    }
}
