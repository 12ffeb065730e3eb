use std::sync::Arc;

use network::{Connection, Listener};
use registry::Observer;
use storage::Region;

use crate::handlers::{Context, HandlerRegistry, Parameters};
use crate::{BucketCache, Config, Result};

pub struct Manager {
    config: Config,
    cache: Arc<BucketCache>,
    handlers: Arc<HandlerRegistry>,
}

impl Manager {
    pub fn new(config: Config) -> Self {
        Self::with_handlers(config, HandlerRegistry::with_defaults())
    }

    pub fn with_handlers(config: Config, handlers: HandlerRegistry) -> Self {
        Self {
            config,
            cache: Arc::new(BucketCache::new()),
            handlers: Arc::new(handlers),
        }
    }

    pub fn region(&self) -> Region {
        self.config.region
    }

    pub fn cache(&self) -> Arc<BucketCache> {
        self.cache.clone()
    }

    pub fn observer(&self) -> Arc<dyn Observer> {
        self.cache.clone()
    }

    pub async fn bind(&self) -> Result<Listener> {
        let listener =
            Listener::bind(&self.config.host, self.config.port, self.config.io_timeout()).await?;
        tracing::info!(
            "Manager listening on {} (region {})",
            listener.local_addr()?,
            self.config.region
        );
        Ok(listener)
    }

    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.run(listener).await
    }

    pub async fn run(&self, listener: Listener) -> Result<()> {
        loop {
            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Manager failed to accept connection: {}", e);
                    continue;
                }
            };

            let region = self.config.region;
            let cache = self.cache.clone();
            let handlers = self.handlers.clone();
            tokio::spawn(async move {
                serve(conn, region, cache, handlers).await;
            });
        }
    }
}

async fn serve(
    mut conn: Connection,
    region: Region,
    cache: Arc<BucketCache>,
    handlers: Arc<HandlerRegistry>,
) {
    let peer = conn.peer_addr();
    let header = match conn.receive_chunk().await {
        Ok(header) => header,
        Err(e) => {
            tracing::warn!("No command header from {}: {}", peer, e);
            return;
        }
    };

    let mut words = header.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => {
            tracing::warn!("Empty command from {}", peer);
            return;
        }
    };
    let handler = match handlers.get(command) {
        Some(handler) => handler,
        None => {
            tracing::warn!("Unknown command {:?} from {}, closing", command, peer);
            return;
        }
    };
    let params = Parameters::parse(words);

    let mut ctx = Context {
        region,
        buckets: cache.snapshot().await,
        cache,
        conn,
    };

    let response = match handler.handle(&mut ctx, params).await {
        Ok(response) => {
            tracing::info!("Handled {} from {}: {}", command, peer, response.status);
            response
        }
        Err(e) => {
            tracing::error!("{} from {} failed: {}", command, peer, e);
            handler.failure(&e)
        }
    };

    if let Err(e) = response.send(&mut ctx.conn).await {
        tracing::warn!("Failed to reply to {}: {}", peer, e);
        return;
    }
    if let Err(e) = ctx.conn.close().await {
        tracing::debug!("Closing connection to {}: {}", peer, e);
    }
}
