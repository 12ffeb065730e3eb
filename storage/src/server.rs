use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use network::{Connection, Listener};
use tokio::fs;
use uuid::Uuid;

use crate::{Announcement, BucketSpec, Config, File, Region, Result, StatusCode, StorageError};

// Connections are served one after another.
pub struct BucketServer {
    id: String,
    host: String,
    port: u16,
    region: Region,
    path: PathBuf,
    registries: Vec<(String, u16)>,
    spec: BucketSpec,
    io_timeout: Duration,
    listener: Listener,
}

impl BucketServer {
    pub async fn new(config: Config) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        let path = config.base_path.join(&id);
        fs::create_dir_all(&path).await?;
        let path = fs::canonicalize(&path).await?;

        let io_timeout = config.io_timeout();
        let listener = Listener::bind(&config.host, config.port, io_timeout).await?;
        let port = listener.local_addr()?.port();

        tracing::info!("Bucket {} ({}) created at {:?}", id, config.region, path);

        Ok(Self {
            id,
            host: config.host,
            port,
            region: config.region,
            path,
            registries: config.registries,
            spec: BucketSpec::with_capacity(config.capacity),
            io_timeout,
            listener,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spec(&self) -> BucketSpec {
        self.spec
    }

    // Stops at the first registry that cannot be reached.
    pub async fn register(&self) -> Result<()> {
        let announcement = Announcement::Register {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            region: self.region,
            path: self.path.clone(),
            spec: self.spec,
        };

        for (host, port) in &self.registries {
            self.announce(host, *port, &announcement)
                .await
                .map_err(|e| StorageError::Registration(format!("{}:{}: {}", host, port, e)))?;
            tracing::info!("Bucket {} registered in {}:{}", self.id, host, port);
        }
        Ok(())
    }

    pub async fn try_update(&self) {
        let announcement = Announcement::Update {
            id: self.id.clone(),
            spec: self.spec,
        };
        self.broadcast(&announcement).await;
    }

    pub async fn unregister(&self) {
        let announcement = Announcement::Unregister {
            id: self.id.clone(),
        };
        self.broadcast(&announcement).await;
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self.register().await {
            tracing::error!("Bucket {} could not register: {}", self.id, e);
            return Err(e);
        }

        tracing::info!(
            "Bucket {} serving on {}:{} (region {})",
            self.id,
            self.host,
            self.port,
            self.region
        );

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok(mut client) => {
                    if let Err(e) = self.handle_connection(&mut client).await {
                        tracing::error!("Bucket {} request from {} failed: {}", self.id, client.peer_addr(), e);
                    }
                    drop(client);
                    self.try_update().await;
                }
                Err(e) => tracing::warn!("Bucket {} failed to accept connection: {}", self.id, e),
            }
        }

        tracing::info!("Bucket {} shutting down", self.id);
        self.unregister().await;
        Ok(())
    }

    async fn handle_connection(&mut self, client: &mut Connection) -> Result<StatusCode> {
        let line = client.receive_line().await?;
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_uppercase();
        let args: Vec<&str> = parts.collect();

        let outcome = match command.as_str() {
            "GET" => self.handle_get(client, &args).await,
            "PUT" => self.handle_put(client, &args).await,
            "DELETE" => self.handle_delete(client, &args).await,
            "LIST" => self.handle_list(client).await,
            "SPEC" => self.handle_spec(client).await,
            "" => Err(StorageError::InvalidCommand("empty command".to_string())),
            other => Err(StorageError::InvalidCommand(format!("unknown command: {}", other))),
        };

        match outcome {
            Ok(status) => {
                tracing::info!("{} ({}) - {}", command, args.join(", "), status);
                Ok(status)
            }
            Err(e) => {
                let reply = format!("{}\n{}\n", StatusCode::Error, e);
                if let Err(send_error) = client.send(reply).await {
                    tracing::debug!("Could not report error to {}: {}", client.peer_addr(), send_error);
                }
                Err(e)
            }
        }
    }

    async fn handle_get(&mut self, client: &mut Connection, args: &[&str]) -> Result<StatusCode> {
        let filename = filename_arg(args)?;

        match fs::read(self.path.join(filename)).await {
            Ok(content) => {
                client.send_line(StatusCode::Ok.as_str()).await?;
                client.send_line(&format!("{} {}", filename, content.len())).await?;
                client.send(&content).await?;
                Ok(StatusCode::Ok)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                client.send_line(StatusCode::NotFound.as_str()).await?;
                Ok(StatusCode::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_put(&mut self, client: &mut Connection, args: &[&str]) -> Result<StatusCode> {
        let filename = filename_arg(args)?;

        let content = match args.get(1) {
            Some(len) => {
                let len: u64 = len
                    .parse()
                    .map_err(|_| StorageError::InvalidCommand(format!("invalid length: {}", len)))?;
                if len as i128 > self.spec.available_space as i128 {
                    client.discard(len).await?;
                    return self.reject_put(client, len).await;
                }
                client.receive_exact(len as usize).await?
            }
            None => client.receive_to_end().await?,
        };

        let size = content.len() as u64;
        if size as i128 > self.spec.available_space as i128 {
            return self.reject_put(client, size).await;
        }

        fs::write(self.path.join(filename), &content).await?;

        self.spec.available_space -= size as i64;
        self.spec.used_space = directory_size(&self.path).await?;
        self.spec.files_count += 1;

        client.send_line(StatusCode::Ok.as_str()).await?;
        Ok(StatusCode::Ok)
    }

    async fn reject_put(&self, client: &mut Connection, size: u64) -> Result<StatusCode> {
        tracing::warn!(
            "Bucket {} rejected {} bytes: only {} available",
            self.id,
            size,
            self.spec.available_space
        );
        client.send_line(StatusCode::InsufficientSpace.as_str()).await?;
        Ok(StatusCode::InsufficientSpace)
    }

    async fn handle_delete(&mut self, client: &mut Connection, args: &[&str]) -> Result<StatusCode> {
        let filename = filename_arg(args)?;
        let path = self.path.join(filename);

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                client.send_line(StatusCode::NotFound.as_str()).await?;
                return Ok(StatusCode::NotFound);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                client.send_line(StatusCode::NotFound.as_str()).await?;
                return Ok(StatusCode::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        fs::remove_file(&path).await?;

        self.spec.available_space += metadata.len() as i64;
        self.spec.files_count = self.spec.files_count.saturating_sub(1);
        self.spec.used_space = directory_size(&self.path).await?;

        client.send_line(StatusCode::Ok.as_str()).await?;
        Ok(StatusCode::Ok)
    }

    async fn handle_list(&mut self, client: &mut Connection) -> Result<StatusCode> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        client.send_line(StatusCode::Ok.as_str()).await?;
        client.send_line(&names.join(" ")).await?;
        Ok(StatusCode::Ok)
    }

    async fn handle_spec(&mut self, client: &mut Connection) -> Result<StatusCode> {
        client.send_line(StatusCode::Ok.as_str()).await?;
        client.send_line(&self.spec.to_string()).await?;
        Ok(StatusCode::Ok)
    }

    async fn broadcast(&self, announcement: &Announcement) {
        for (host, port) in &self.registries {
            match self.announce(host, *port, announcement).await {
                Ok(()) => tracing::debug!(
                    "Bucket {} sent {} to {}:{}",
                    self.id,
                    announcement.command(),
                    host,
                    port
                ),
                Err(e) => tracing::warn!(
                    "Bucket {} failed to send {} to {}:{}: {}",
                    self.id,
                    announcement.command(),
                    host,
                    port,
                    e
                ),
            }
        }
    }

    async fn announce(&self, host: &str, port: u16, announcement: &Announcement) -> Result<()> {
        let mut registry = Connection::connect(host, port, self.io_timeout).await?;
        registry.send_line(&announcement.to_string()).await?;
        registry.close().await?;
        Ok(())
    }
}

fn filename_arg<'a>(args: &[&'a str]) -> Result<&'a str> {
    let filename = args
        .first()
        .copied()
        .ok_or_else(|| StorageError::InvalidCommand("missing file name".to_string()))?;
    File::validate_name(filename)?;
    Ok(filename)
}

pub async fn directory_size(root: &Path) -> Result<u64> {
    let metadata = fs::metadata(root).await?;
    if !metadata.is_dir() {
        return Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a directory", root.display()),
        )));
    }

    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata().await?.len();
            }
        }
    }
    Ok(total)
}
