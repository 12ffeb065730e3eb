use async_trait::async_trait;
use registry::Observer;
use storage::{BucketHandle, BucketSpec};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct BucketCache {
    buckets: RwLock<Vec<BucketHandle>>,
}

impl BucketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<BucketHandle> {
        self.buckets.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<BucketHandle> {
        self.buckets
            .read()
            .await
            .iter()
            .find(|bucket| bucket.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }

    pub async fn record_file(&self, id: &str, filename: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        match buckets.iter_mut().find(|bucket| bucket.id == id) {
            Some(bucket) => {
                bucket.files.insert(filename.to_string());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Observer for BucketCache {
    async fn registered(&self, bucket: BucketHandle) {
        tracing::info!("Bucket registered: {}", bucket);
        let mut buckets = self.buckets.write().await;
        match buckets.iter_mut().find(|known| known.id == bucket.id) {
            Some(known) => *known = bucket,
            None => buckets.push(bucket),
        }
    }

    async fn unregistered(&self, id: &str) {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|bucket| bucket.id != id);

        if buckets.len() < before {
            tracing::info!("Bucket unregistered: {}", id);
        } else {
            tracing::warn!("Unregister for unknown bucket {}", id);
        }
    }

    async fn updated(&self, id: &str, spec: BucketSpec) {
        let mut buckets = self.buckets.write().await;
        match buckets.iter_mut().find(|bucket| bucket.id == id) {
            Some(bucket) => {
                tracing::debug!("Bucket {} updated: {}", id, spec);
                bucket.spec = Some(spec);
            }
            None => tracing::warn!("Update for unknown bucket {}", id),
        }
    }
}
