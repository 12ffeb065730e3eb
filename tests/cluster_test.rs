use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use c9::manager::{client, BucketCache};
use c9::network::Connection;
use c9::storage::{BucketHandle, BucketServer, Region};
use c9::{Config, ManagerNode};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Cluster {
    config: Config,
    manager_port: u16,
    cache: Arc<BucketCache>,
    data: TempDir,
    stop: watch::Sender<bool>,
    buckets: Vec<JoinHandle<()>>,
}

impl Cluster {
    async fn start(manager_region: Region, capacity: i64, regions: &[Region]) -> Self {
        let data = tempfile::tempdir().unwrap();
        let mut config = Config {
            host: "127.0.0.1".to_string(),
            registry_port: 0,
            manager_port: 0,
            data_dir: data.path().to_path_buf(),
            manager_region,
            bucket_capacity: capacity,
            io_timeout_ms: 2_000,
            ..Config::default()
        };

        let node = ManagerNode::new(&config).await.unwrap();
        let registry_listener = node.registry().bind().await.unwrap();
        let manager_listener = node.manager().bind().await.unwrap();
        let registry_port = registry_listener.local_addr().unwrap().port();
        let manager_port = manager_listener.local_addr().unwrap().port();
        let cache = node.manager().cache();

        tokio::spawn(async move {
            let _ = node.run(registry_listener, manager_listener).await;
        });
        config.registries = vec![format!("127.0.0.1:{}", registry_port)];

        let (stop, _) = watch::channel(false);
        let mut cluster = Cluster {
            config,
            manager_port,
            cache,
            data,
            stop,
            buckets: Vec::new(),
        };
        for region in regions {
            cluster.add_bucket(*region).await;
        }
        cluster
    }

    async fn add_bucket(&mut self, region: Region) {
        let expected = self.cache.len().await + 1;
        let bucket = BucketServer::new(self.config.bucket(0, region).unwrap())
            .await
            .unwrap();

        let mut stop = self.stop.subscribe();
        self.buckets.push(tokio::spawn(async move {
            let _ = bucket
                .run_until(async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await;
        }));

        let cache = self.cache.clone();
        eventually(|| {
            let cache = cache.clone();
            async move { cache.len().await == expected }
        })
        .await;
    }

    async fn bucket_in(&self, region: Region) -> BucketHandle {
        self.cache
            .snapshot()
            .await
            .into_iter()
            .find(|bucket| bucket.region == region)
            .unwrap()
    }

    async fn upload(&self, filename: &str, content: &[u8]) -> client::CommandResult {
        let path = self.data.path().join(format!("upload-{}", filename));
        tokio::fs::write(&path, content).await.unwrap();
        client::upload("127.0.0.1", self.manager_port, &path, filename, TIMEOUT)
            .await
            .unwrap()
    }

    async fn download(&self, filename: &str) -> (client::CommandResult, Option<Vec<u8>>) {
        let dest = self.data.path().join(format!("download-{}", filename));
        let result = client::download("127.0.0.1", self.manager_port, filename, &dest, TIMEOUT)
            .await
            .unwrap();
        let content = tokio::fs::read(&dest).await.ok();
        (result, content)
    }
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

async fn holders(cluster: &Cluster, filename: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    for bucket in cluster.cache.snapshot().await {
        if bucket.list().await.unwrap().iter().any(|name| name == filename) {
            regions.push(bucket.region);
        }
    }
    regions.sort_by_key(|region| region.as_str());
    regions
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let cluster = Cluster::start(
        Region::LatinAmerica,
        1_000_000,
        &[Region::UsEast, Region::Eu, Region::Asia],
    )
    .await;

    let content = b"the quick brown fox jumps over the lazy dog".to_vec();
    let uploaded = cluster.upload("fox.txt", &content).await;
    assert!(uploaded.success, "{}", uploaded);
    assert_eq!(uploaded.message, "File uploaded successfully.");

    let (downloaded, body) = cluster.download("fox.txt").await;
    assert!(downloaded.success, "{}", downloaded);
    assert_eq!(downloaded.message, "File downloaded successfully.");
    assert_eq!(body.unwrap(), content);
}

#[tokio::test]
async fn test_upload_lands_on_nearest_two_buckets() {
    let cluster = Cluster::start(
        Region::LatinAmerica,
        1_000_000,
        &[Region::Asia, Region::Eu, Region::UsEast],
    )
    .await;

    assert!(cluster.upload("report.csv", b"a,b,c\n1,2,3\n").await.success);

    assert_eq!(
        holders(&cluster, "report.csv").await,
        vec![Region::Eu, Region::UsEast]
    );

    let primary = cluster.bucket_in(Region::UsEast).await;
    let backup = cluster.bucket_in(Region::Eu).await;
    let other = cluster.bucket_in(Region::Asia).await;
    assert!(primary.has_file("report.csv"));
    assert!(backup.has_file("report.csv"));
    assert!(!other.has_file("report.csv"));
}

#[tokio::test]
async fn test_bucket_updates_reach_the_manager() {
    let cluster = Cluster::start(Region::Eu, 1_000, &[Region::Eu, Region::Africa]).await;

    assert!(cluster.upload("blob.bin", &[7u8; 100]).await.success);

    let cache = cluster.cache.clone();
    eventually(|| {
        let cache = cache.clone();
        async move {
            let snapshot = cache.snapshot().await;
            snapshot.iter().all(|bucket| {
                bucket
                    .spec
                    .map(|spec| spec.files_count == 1 && spec.available_space == 900)
                    .unwrap_or(false)
            })
        }
    })
    .await;

    let live = cluster.bucket_in(Region::Eu).await.fetch_spec().await.unwrap();
    assert_eq!(live.used_space, 100);
}

#[tokio::test]
async fn test_upload_larger_than_any_bucket_fails() {
    let cluster = Cluster::start(Region::UsWest, 10, &[Region::UsWest, Region::Asia]).await;

    let result = cluster.upload("big.bin", &[0u8; 11]).await;
    assert!(!result.success);
    assert_eq!(result.message, "File upload failed.");
    assert!(holders(&cluster, "big.bin").await.is_empty());
}

#[tokio::test]
async fn test_single_bucket_stores_one_copy() {
    let cluster = Cluster::start(Region::Asia, 1_000, &[Region::Australia]).await;

    assert!(cluster.upload("solo.txt", b"alone").await.success);
    assert_eq!(holders(&cluster, "solo.txt").await, vec![Region::Australia]);

    let (result, body) = cluster.download("solo.txt").await;
    assert!(result.success);
    assert_eq!(body.unwrap(), b"alone");
}

#[tokio::test]
async fn test_download_of_unknown_file_fails() {
    let cluster = Cluster::start(Region::Eu, 1_000, &[Region::Eu]).await;

    let (result, body) = cluster.download("never-uploaded.txt").await;
    assert!(!result.success);
    assert_eq!(result.message, "File download failed.");
    assert!(body.is_none());
}

#[tokio::test]
async fn test_unknown_command_is_dropped_and_manager_keeps_serving() {
    let cluster = Cluster::start(Region::Africa, 1_000, &[Region::Eu, Region::Africa]).await;

    let mut conn = Connection::connect("127.0.0.1", cluster.manager_port, TIMEOUT)
        .await
        .unwrap();
    conn.send_chunk("explode everything").await.unwrap();
    assert!(conn.receive_to_end().await.unwrap().is_empty());

    assert!(cluster.upload("after.txt", b"still here").await.success);
    let (result, body) = cluster.download("after.txt").await;
    assert!(result.success);
    assert_eq!(body.unwrap(), b"still here");
}

#[tokio::test]
async fn test_stopped_buckets_unregister() {
    let cluster = Cluster::start(Region::Eu, 1_000, &[Region::Eu, Region::Asia]).await;
    assert_eq!(cluster.cache.len().await, 2);

    cluster.stop.send(true).unwrap();
    for bucket in cluster.buckets {
        bucket.await.unwrap();
    }

    let cache = cluster.cache.clone();
    eventually(|| {
        let cache = cache.clone();
        async move { cache.is_empty().await }
    })
    .await;
}

#[tokio::test]
async fn test_failed_backup_keeps_primary_copy() {
    let mut cluster = Cluster::start(Region::Eu, 1_000, &[Region::Eu, Region::Asia]).await;

    // Killed without unregistering, so the manager still routes backups to it.
    let backup = &mut cluster.buckets[1];
    backup.abort();
    assert!(backup.await.unwrap_err().is_cancelled());
    assert_eq!(cluster.cache.len().await, 2);

    let result = cluster.upload("half.txt", b"only once").await;
    assert!(!result.success);
    assert_eq!(result.message, "File upload failed.");

    let primary = cluster.bucket_in(Region::Eu).await;
    assert!(primary.list().await.unwrap().iter().any(|name| name == "half.txt"));
    assert!(primary.has_file("half.txt"));
    assert!(!cluster.bucket_in(Region::Asia).await.has_file("half.txt"));

    let (downloaded, body) = cluster.download("half.txt").await;
    assert!(downloaded.success, "{}", downloaded);
    assert_eq!(body.unwrap(), b"only once");
}

#[tokio::test]
async fn test_download_does_not_fall_back_when_holder_lost_the_file() {
    let cluster = Cluster::start(Region::Eu, 1_000, &[Region::Eu, Region::Asia]).await;

    assert!(cluster.upload("twice.txt", b"two copies").await.success);
    assert_eq!(
        holders(&cluster, "twice.txt").await,
        vec![Region::Asia, Region::Eu]
    );

    cluster.bucket_in(Region::Eu).await.delete("twice.txt").await.unwrap();

    let mut conn = Connection::connect("127.0.0.1", cluster.manager_port, TIMEOUT)
        .await
        .unwrap();
    conn.send_chunk("download twice.txt").await.unwrap();
    assert_eq!(conn.receive_chunk().await.unwrap(), "NOT_FOUND");
    assert_eq!(conn.receive_chunk().await.unwrap(), "no-content");

    let backup = cluster.bucket_in(Region::Asia).await;
    assert!(backup.list().await.unwrap().iter().any(|name| name == "twice.txt"));
}
