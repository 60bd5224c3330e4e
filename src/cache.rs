//! Advisory submission metadata, kept for a bounded time per job.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::{OrderId, WarehouseId};
use crate::traits::MetadataCache;

/// What was submitted for a job, used to annotate its result later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub warehouses_count: usize,
    pub orders_count: usize,
    pub submitted_at: DateTime<Utc>,
    /// Warehouse id per depot location, empty when submitted as a bare payload.
    #[serde(default)]
    pub warehouse_ids: Vec<WarehouseId>,
    /// Order id per order location, empty when submitted as a bare payload.
    #[serde(default)]
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    metadata: SubmissionMetadata,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry.
///
/// Concurrent writers to the same job id simply overwrite each other.
#[derive(Debug, Default)]
pub struct InMemoryMetadataCache {
    entries: DashMap<String, CachedEntry>,
}

impl InMemoryMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Expired entries are also dropped lazily on read.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl MetadataCache for InMemoryMetadataCache {
    fn get(&self, job_id: &str) -> Option<SubmissionMetadata> {
        let now = Instant::now();
        // The shard guard must be released before `remove_if` touches the same shard.
        let live = self
            .entries
            .get(job_id)
            .map(|entry| (entry.expires_at > now).then(|| entry.metadata.clone()))?;
        if live.is_none() {
            self.entries.remove_if(job_id, |_, entry| entry.expires_at <= now);
        }
        live
    }

    /// Also sweeps expired entries, so jobs that are never polled to
    /// completion do not accumulate.
    fn put(&self, job_id: &str, metadata: SubmissionMetadata, ttl: Duration) {
        self.purge_expired();
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(job_id.to_string(), CachedEntry { metadata, expires_at });
    }
}

/// A cache that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetadataCache;

impl MetadataCache for NoopMetadataCache {
    fn get(&self, _job_id: &str) -> Option<SubmissionMetadata> {
        None
    }

    fn put(&self, _job_id: &str, _metadata: SubmissionMetadata, _ttl: Duration) {}
}
