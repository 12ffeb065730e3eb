use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::{NetworkError, Result, CHUNK_SIZE, MAX_LINE_LENGTH};

const PREALLOCATE_LIMIT: usize = 1024 * 1024;

// Every read and write is bounded by `io_timeout`.
pub struct Connection {
    stream: BufStream<TcpStream>,
    peer: SocketAddr,
    io_timeout: Duration,
}

impl Connection {
    pub fn new(stream: TcpStream, io_timeout: Duration) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream: BufStream::new(stream),
            peer,
            io_timeout,
        })
    }

    pub async fn connect(host: &str, port: u16, io_timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(io_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| NetworkError::Timeout(format!("connect to {}:{}", host, port)))?
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}:{}: {}", host, port, e)))?;

        stream.set_nodelay(true)?;
        tracing::trace!("Connected to {}:{}", host, port);
        Self::new(stream, io_timeout)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        let stream = &mut self.stream;
        with_deadline(self.io_timeout, "send", async move {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
    }

    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(data).await
    }

    pub async fn send_chunk(&mut self, text: &str) -> Result<()> {
        let frame = pad_chunk(text)?;
        self.send(frame).await
    }

    // Empty means the peer closed its write half.
    pub async fn receive(&mut self) -> Result<Bytes> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = with_deadline(self.io_timeout, "receive", self.stream.read(&mut buf)).await?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    // Deadline per read. The buffer grows with what arrives, not with `len`.
    pub async fn receive_exact(&mut self, len: usize) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(len.min(PREALLOCATE_LIMIT));
        while buf.len() < len {
            let remaining = (len - buf.len()) as u64;
            let mut payload = (&mut self.stream).take(remaining);
            let n = with_deadline(self.io_timeout, "receive", payload.read_buf(&mut buf)).await?;
            if n == 0 {
                return Err(self.truncated(buf.len() as u64, len as u64));
            }
        }
        Ok(buf.freeze())
    }

    pub async fn discard(&mut self, len: u64) -> Result<()> {
        let mut scratch = vec![0u8; CHUNK_SIZE * 8];
        let mut dropped = 0u64;
        while dropped < len {
            let want = (len - dropped).min(scratch.len() as u64) as usize;
            let n = with_deadline(self.io_timeout, "discard", self.stream.read(&mut scratch[..want]))
                .await?;
            if n == 0 {
                return Err(self.truncated(dropped, len));
            }
            dropped += n as u64;
        }
        Ok(())
    }

    pub async fn receive_to_end(&mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        loop {
            let piece = self.receive().await?;
            if piece.is_empty() {
                return Ok(buf.freeze());
            }
            buf.extend_from_slice(&piece);
        }
    }

    pub async fn receive_chunk(&mut self) -> Result<String> {
        let frame = self.receive_exact(CHUNK_SIZE).await?;
        let text = String::from_utf8(frame.to_vec())?;
        Ok(text.trim().to_string())
    }

    pub async fn receive_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let mut reader = (&mut self.stream).take(MAX_LINE_LENGTH as u64);
        let n = with_deadline(self.io_timeout, "receive", reader.read_until(b'\n', &mut line)).await?;

        if n == 0 {
            return Err(NetworkError::Protocol(format!(
                "{} closed the connection before sending a line",
                self.peer
            )));
        }
        if n == MAX_LINE_LENGTH && line.last() != Some(&b'\n') {
            return Err(NetworkError::Protocol(format!(
                "line from {} exceeds {} bytes",
                self.peer, MAX_LINE_LENGTH
            )));
        }

        let text = String::from_utf8(line)?;
        Ok(text.trim().to_string())
    }

    pub async fn finish(&mut self) -> Result<()> {
        with_deadline(self.io_timeout, "shutdown", self.stream.shutdown()).await
    }

    pub async fn close(mut self) -> Result<()> {
        match self.finish().await {
            Err(NetworkError::Io(e)) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn truncated(&self, received: u64, expected: u64) -> NetworkError {
        NetworkError::Protocol(format!(
            "{} closed the connection after {} of {} bytes",
            self.peer, received, expected
        ))
    }
}

async fn with_deadline<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(NetworkError::from),
        Err(_) => Err(NetworkError::Timeout(format!(
            "{} did not complete within {:?}",
            operation, limit
        ))),
    }
}

pub fn pad_chunk(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.len() > CHUNK_SIZE {
        return Err(NetworkError::ChunkTooLarge {
            len: bytes.len(),
            max: CHUNK_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(CHUNK_SIZE);
    frame.extend_from_slice(bytes);
    frame.resize(CHUNK_SIZE, b' ');
    Ok(frame)
}
