use std::sync::Arc;

use network::{Connection, Listener};
use storage::Announcement;
use tokio::sync::RwLock;

use crate::{Config, Observer, RegistryEvent, Result};

pub struct Subject {
    config: Config,
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl Subject {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers.write().await.push(observer);
    }

    pub async fn unsubscribe(&self, observer: &Arc<dyn Observer>) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|subscribed| !Arc::ptr_eq(subscribed, observer));
        observers.len() != before
    }

    pub async fn subscriber_count(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn publish(&self, event: RegistryEvent) {
        let observers = self.observers.read().await.clone();

        for observer in observers {
            match &event {
                RegistryEvent::Registered(bucket) => observer.registered(bucket.clone()).await,
                RegistryEvent::Unregistered { id } => observer.unregistered(id).await,
                RegistryEvent::Updated { id, spec } => observer.updated(id, *spec).await,
            }
        }
    }

    pub async fn bind(&self) -> Result<Listener> {
        let listener =
            Listener::bind(&self.config.host, self.config.port, self.config.io_timeout()).await?;
        tracing::info!("Registry listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub async fn listen(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    // Sequential: the next connection waits until every observer has seen the event.
    pub async fn serve(&self, listener: Listener) -> Result<()> {
        loop {
            let mut bucket = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Registry failed to accept connection: {}", e);
                    continue;
                }
            };

            match self.read_event(&mut bucket).await {
                Ok(event) => {
                    let name = event.name();
                    let id = event.bucket_id().to_string();
                    self.publish(event).await;
                    tracing::info!("Handled command: {} {}", name, id);
                }
                Err(e) => tracing::warn!("Dropped announcement from {}: {}", bucket.peer_addr(), e),
            }
        }
    }

    async fn read_event(&self, bucket: &mut Connection) -> Result<RegistryEvent> {
        let line = bucket.receive_line().await?;
        let announcement: Announcement = line.parse()?;
        Ok(RegistryEvent::from_announcement(
            announcement,
            self.config.io_timeout(),
        ))
    }
}
