use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use network::Connection;

use crate::{BucketSpec, File, Region, Result, StatusCode, StorageError};

// `files` is best-effort: never reconciled with the bucket's listing.
#[derive(Debug, Clone)]
pub struct BucketHandle {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub region: Region,
    pub path: PathBuf,
    pub spec: Option<BucketSpec>,
    pub files: HashSet<String>,
    io_timeout: Duration,
}

impl BucketHandle {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        region: Region,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            region,
            path: path.into(),
            spec: None,
            files: HashSet::new(),
            io_timeout: Duration::from_millis(network::DEFAULT_IO_TIMEOUT_MS),
        }
    }

    pub fn with_spec(mut self, spec: BucketSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn available_space(&self) -> i64 {
        self.spec.map(|spec| spec.available_space).unwrap_or(0)
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }

    pub async fn get(&self, filename: &str) -> Result<File> {
        let mut conn = self.open(&format!("GET {}", filename)).await?;

        match self.read_status(&mut conn).await? {
            StatusCode::Ok => {
                let header = conn.receive_line().await?;
                let (name, len) = parse_file_header(&header)?;
                let content = conn.receive_exact(len).await?;
                tracing::debug!("Got {} ({} bytes) from bucket {}", name, len, self.id);
                Ok(File::new(name, content))
            }
            StatusCode::NotFound => Err(StorageError::NotFound(filename.to_string())),
            status => Err(self.unexpected(&mut conn, status).await),
        }
    }

    pub async fn put(&self, file: &File) -> Result<()> {
        let mut conn = self
            .open(&format!("PUT {} {}", file.name, file.size()))
            .await?;
        conn.send(&file.content).await?;

        match self.read_status(&mut conn).await? {
            StatusCode::Ok => {
                tracing::debug!("Put {} ({} bytes) to bucket {}", file.name, file.size(), self.id);
                Ok(())
            }
            StatusCode::InsufficientSpace => Err(StorageError::InsufficientSpace {
                required: file.size(),
                available: self.available_space(),
            }),
            status => Err(self.unexpected(&mut conn, status).await),
        }
    }

    pub async fn delete(&self, filename: &str) -> Result<()> {
        let mut conn = self.open(&format!("DELETE {}", filename)).await?;

        match self.read_status(&mut conn).await? {
            StatusCode::Ok => Ok(()),
            StatusCode::NotFound => Err(StorageError::NotFound(filename.to_string())),
            status => Err(self.unexpected(&mut conn, status).await),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let mut conn = self.open("LIST").await?;

        match self.read_status(&mut conn).await? {
            StatusCode::Ok => {
                let line = conn.receive_line().await?;
                Ok(line.split_whitespace().map(str::to_string).collect())
            }
            status => Err(self.unexpected(&mut conn, status).await),
        }
    }

    pub async fn fetch_spec(&self) -> Result<BucketSpec> {
        let mut conn = self.open("SPEC").await?;

        match self.read_status(&mut conn).await? {
            StatusCode::Ok => conn.receive_line().await?.parse(),
            status => Err(self.unexpected(&mut conn, status).await),
        }
    }

    async fn open(&self, command: &str) -> Result<Connection> {
        let mut conn = Connection::connect(&self.host, self.port, self.io_timeout).await?;
        conn.send_line(command).await?;
        Ok(conn)
    }

    async fn read_status(&self, conn: &mut Connection) -> Result<StatusCode> {
        conn.receive_line().await?.parse()
    }

    async fn unexpected(&self, conn: &mut Connection, status: StatusCode) -> StorageError {
        match status {
            StatusCode::Error => {
                let message = conn.receive_line().await.unwrap_or_default();
                StorageError::Remote(format!("bucket {}: {}", self.id, message))
            }
            other => StorageError::Protocol(format!("bucket {} replied {}", self.id, other)),
        }
    }
}

impl fmt::Display for BucketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bucket({} @ {}:{}, {})", self.id, self.host, self.port, self.region)
    }
}

fn parse_file_header(header: &str) -> Result<(String, usize)> {
    let mut fields = header.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(name), Some(len), None) => {
            let len = len
                .parse()
                .map_err(|_| StorageError::Protocol(format!("invalid file length: {:?}", len)))?;
            Ok((name.to_string(), len))
        }
        _ => Err(StorageError::Protocol(format!("malformed file header: {:?}", header))),
    }
}
