use std::fmt;
use std::path::Path;
use std::time::Duration;

use network::{Connection, ContentType, Status};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub async fn upload(
    host: &str,
    port: u16,
    path: &Path,
    filename: &str,
    io_timeout: Duration,
) -> Result<CommandResult> {
    let content = tokio::fs::read(path)
        .await
        .map_err(network::NetworkError::from)?;

    let mut conn = Connection::connect(host, port, io_timeout).await?;
    conn.send_chunk(&format!("upload {} size={}", filename, content.len()))
        .await?;
    conn.send(&content).await?;

    let (status, _) = receive_header(&mut conn).await?;
    Ok(match status {
        Status::Ok => CommandResult::success("File uploaded successfully."),
        _ => CommandResult::failure("File upload failed."),
    })
}

pub async fn download(
    host: &str,
    port: u16,
    filename: &str,
    dest: &Path,
    io_timeout: Duration,
) -> Result<CommandResult> {
    let mut conn = Connection::connect(host, port, io_timeout).await?;
    conn.send_chunk(&format!("download {}", filename)).await?;

    let (status, content_type) = receive_header(&mut conn).await?;
    let body = match content_type {
        ContentType::NoContent => None,
        _ => Some(conn.receive_to_end().await?),
    };

    match (status, body) {
        (Status::Ok, Some(content)) => {
            tokio::fs::write(dest, &content)
                .await
                .map_err(network::NetworkError::from)?;
            Ok(CommandResult::success("File downloaded successfully."))
        }
        _ => Ok(CommandResult::failure("File download failed.")),
    }
}

async fn receive_header(conn: &mut Connection) -> Result<(Status, ContentType)> {
    let status: Status = conn.receive_chunk().await?.parse()?;
    let content_type: ContentType = conn.receive_chunk().await?.parse()?;
    Ok((status, content_type))
}
