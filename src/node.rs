use std::sync::Arc;

use futures::future::join_all;
use manager::Manager;
use network::Listener;
use registry::Subject;
use storage::{BucketServer, Region};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{C9Error, Result};

pub struct ManagerNode {
    registry: Arc<Subject>,
    manager: Arc<Manager>,
}

impl ManagerNode {
    pub async fn new(config: &Config) -> Result<Self> {
        let registry = Arc::new(Subject::new(config.into()));
        let manager = Arc::new(Manager::new(config.into()));
        registry.subscribe(manager.observer()).await;

        Ok(Self { registry, manager })
    }

    pub fn registry(&self) -> Arc<Subject> {
        self.registry.clone()
    }

    pub fn manager(&self) -> Arc<Manager> {
        self.manager.clone()
    }

    pub async fn start(&self) -> Result<()> {
        let registry_listener = self.registry.bind().await?;
        let manager_listener = self.manager.bind().await?;
        self.run(registry_listener, manager_listener).await
    }

    pub async fn run(&self, registry_listener: Listener, manager_listener: Listener) -> Result<()> {
        info!("Starting c9 manager services");

        let registry_task = {
            let registry = self.registry.clone();
            tokio::spawn(async move { registry.serve(registry_listener).await })
        };

        let manager_task = {
            let manager = self.manager.clone();
            tokio::spawn(async move { manager.run(manager_listener).await })
        };

        tokio::select! {
            result = registry_task => {
                error!("Registry stopped: {:?}", result);
                Err(C9Error::Stopped("registry".to_string()))
            }
            result = manager_task => {
                error!("Manager stopped: {:?}", result);
                Err(C9Error::Stopped("manager".to_string()))
            }
        }
    }
}

pub async fn create_buckets(
    config: &Config,
    count: usize,
    start_port: u16,
    region: Option<Region>,
) -> Result<Vec<BucketServer>> {
    let mut buckets = Vec::with_capacity(count);
    for i in 0..count {
        let port = u16::try_from(i)
            .ok()
            .and_then(|offset| start_port.checked_add(offset))
            .ok_or_else(|| C9Error::InvalidConfig(format!("no port left for bucket {}", i)))?;
        let region = region.unwrap_or_else(Region::random);

        buckets.push(BucketServer::new(config.bucket(port, region)?).await?);
    }
    Ok(buckets)
}

// Stops on ctrl-c; each bucket unregisters on the way out.
pub async fn run_buckets(buckets: Vec<BucketServer>) -> Result<()> {
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for ctrl-c, buckets run until killed: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down buckets");
        let _ = stop_tx.send(true);
    });

    let runs = buckets.into_iter().map(|bucket| {
        let mut stop = stop_rx.clone();
        let id = bucket.id().to_string();
        async move {
            let outcome = bucket
                .run_until(async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await;
            (id, outcome)
        }
    });

    let mut failed = 0;
    for (id, outcome) in join_all(runs).await {
        if let Err(e) = outcome {
            error!("Bucket {} stopped: {}", id, e);
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(C9Error::Stopped(format!("{} bucket(s) failed", failed)));
    }
    Ok(())
}
