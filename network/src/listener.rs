use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{Connection, NetworkError, Result};

pub struct Listener {
    inner: TcpListener,
    io_timeout: Duration,
}

impl Listener {
    pub async fn bind(host: &str, port: u16, io_timeout: Duration) -> Result<Self> {
        let inner = TcpListener::bind((host, port))
            .await
            .map_err(|e| NetworkError::ConnectionFailed(format!("bind {}:{}: {}", host, port, e)))?;

        Ok(Self { inner, io_timeout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    pub async fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        tracing::trace!("Accepted connection from {}", peer);
        Connection::new(stream, self.io_timeout)
    }
}
