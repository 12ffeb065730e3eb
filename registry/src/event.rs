use std::time::Duration;

use storage::{Announcement, BucketHandle, BucketSpec};

#[derive(Debug, Clone)]
pub enum RegistryEvent {
    Registered(BucketHandle),
    Unregistered { id: String },
    Updated { id: String, spec: BucketSpec },
}

impl RegistryEvent {
    pub fn from_announcement(announcement: Announcement, io_timeout: Duration) -> Self {
        match announcement {
            Announcement::Register {
                id,
                host,
                port,
                region,
                path,
                spec,
            } => RegistryEvent::Registered(
                BucketHandle::new(id, host, port, region, path)
                    .with_spec(spec)
                    .with_io_timeout(io_timeout),
            ),
            Announcement::Unregister { id } => RegistryEvent::Unregistered { id },
            Announcement::Update { id, spec } => RegistryEvent::Updated { id, spec },
        }
    }

    pub fn bucket_id(&self) -> &str {
        match self {
            RegistryEvent::Registered(bucket) => &bucket.id,
            RegistryEvent::Unregistered { id } => id,
            RegistryEvent::Updated { id, .. } => id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::Registered(_) => "register",
            RegistryEvent::Unregistered { .. } => "unregister",
            RegistryEvent::Updated { .. } => "update",
        }
    }
}
