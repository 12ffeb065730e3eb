use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use network::{Connection, ContentType, Status};
use storage::{BucketHandle, File, Region, StorageError};

use crate::placement::{self, Selection};
use crate::{BucketCache, ManagerError, Result};

// Bare words are positional, `key=value` words are named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pub args: Vec<String>,
    pub kwargs: HashMap<String, String>,
}

impl Parameters {
    pub fn parse<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        let mut parameters = Parameters::default();
        for word in words {
            match word.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    parameters.kwargs.insert(key.to_string(), value.to_string());
                }
                _ => parameters.args.push(word.to_string()),
            }
        }
        parameters
    }

    pub fn arg(&self, index: usize, name: &str) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| ManagerError::InvalidCommand(format!("missing argument <{}>", name)))
    }

    pub fn size(&self) -> Result<Option<u64>> {
        match self.kwargs.get("size") {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ManagerError::InvalidCommand(format!("invalid size: {:?}", value))),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: ContentType,
    pub body: Option<Bytes>,
}

impl Response {
    pub fn new(status: Status, content_type: ContentType, body: Option<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn ok() -> Self {
        Self::new(Status::Ok, ContentType::NoContent, None)
    }

    pub fn bytes(content: Bytes) -> Self {
        Self::new(Status::Ok, ContentType::Bytes, Some(content))
    }

    pub fn not_found() -> Self {
        Self::new(Status::NotFound, ContentType::NoContent, None)
    }

    pub fn error() -> Self {
        Self::new(Status::Error, ContentType::NoContent, None)
    }

    pub fn error_text(message: &str) -> Self {
        Self::new(
            Status::Error,
            ContentType::TextPlain,
            Some(Bytes::copy_from_slice(message.as_bytes())),
        )
    }

    pub async fn send(&self, conn: &mut Connection) -> network::Result<()> {
        conn.send_chunk(self.status.as_str()).await?;
        conn.send_chunk(self.content_type.as_str()).await?;
        if let Some(body) = &self.body {
            conn.send(body).await?;
        }
        Ok(())
    }
}

pub struct Context {
    pub region: Region,
    pub buckets: Vec<BucketHandle>,
    pub cache: Arc<BucketCache>,
    pub conn: Connection,
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut Context, params: Parameters) -> Result<Response>;

    fn select_bucket<'b>(
        &self,
        buckets: &'b [BucketHandle],
        selection: &Selection<'_>,
    ) -> Option<&'b BucketHandle> {
        placement::select_bucket(buckets, selection)
    }

    fn failure(&self, _error: &ManagerError) -> Response {
        Response::error()
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UploadHandler));
        registry.register(Arc::new(DownloadHandler));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.name(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

pub struct UploadHandler;

#[async_trait]
impl Handler for UploadHandler {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn handle(&self, ctx: &mut Context, params: Parameters) -> Result<Response> {
        let filename = params.arg(0, "filename")?.to_string();
        File::validate_name(&filename)
            .map_err(|e| ManagerError::InvalidCommand(e.to_string()))?;

        let content = match params.size()? {
            Some(size) => {
                let len = usize::try_from(size)
                    .map_err(|_| ManagerError::InvalidCommand(format!("size too large: {}", size)))?;
                ctx.conn.receive_exact(len).await?
            }
            None => ctx.conn.receive_to_end().await?,
        };
        let file = File::new(filename, content);

        let selection = Selection::new(ctx.region, file.size());
        let primary = self
            .select_bucket(&ctx.buckets, &selection)
            .ok_or(ManagerError::NoBucketAvailable {
                required: file.size(),
            })?;
        let backup = self.select_bucket(&ctx.buckets, &selection.excluding(&primary.id));

        primary.put(&file).await?;
        ctx.cache.record_file(&primary.id, &file.name).await;
        tracing::info!("Stored {} ({} bytes) on {}", file.name, file.size(), primary);

        match backup {
            Some(backup) => {
                if let Err(e) = backup.put(&file).await {
                    tracing::error!(
                        "Backup of {} to {} failed, only {} holds it: {}",
                        file.name,
                        backup,
                        primary,
                        e
                    );
                    return Err(e.into());
                }
                ctx.cache.record_file(&backup.id, &file.name).await;
                tracing::info!("Replicated {} to {}", file.name, backup);
            }
            None => tracing::warn!("No backup bucket for {}, stored once", file.name),
        }

        Ok(Response::ok())
    }
}

pub struct DownloadHandler;

#[async_trait]
impl Handler for DownloadHandler {
    fn name(&self) -> &'static str {
        "download"
    }

    async fn handle(&self, ctx: &mut Context, params: Parameters) -> Result<Response> {
        let filename = params.arg(0, "filename")?;

        let bucket = ctx
            .buckets
            .iter()
            .find(|bucket| bucket.has_file(filename))
            .ok_or_else(|| ManagerError::NotFound(filename.to_string()))?;

        let file = match bucket.get(filename).await {
            Ok(file) => file,
            Err(StorageError::NotFound(name)) => return Err(ManagerError::NotFound(name)),
            Err(e) => return Err(ManagerError::Unknown(format!("{}: {}", bucket, e))),
        };

        ctx.cache.record_file(&bucket.id, &file.name).await;
        tracing::info!("Served {} ({} bytes) from {}", file.name, file.size(), bucket);
        Ok(Response::bytes(file.content))
    }

    fn failure(&self, error: &ManagerError) -> Response {
        match error {
            ManagerError::NotFound(_) => Response::not_found(),
            _ => Response::error_text("Unknown error"),
        }
    }
}
