use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::GroupMetadata;

/// 超过此条目数时写入会清扫过期项 / Inserts sweep expired entries past this many entries
const SWEEP_THRESHOLD: usize = 1024;

/// 群组元数据缓存：TTL + 读穿透 + 成员变更时立即失效
/// Group metadata cache: TTL, read-through, eager invalidation on participant changes
pub struct GroupMetadataCache {
    ttl: Duration,
    sweep_at: usize,
    entries: Mutex<HashMap<String, (GroupMetadata, Instant)>>,
}

impl GroupMetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_at: SWEEP_THRESHOLD,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_sweep_threshold(mut self, sweep_at: usize) -> Self {
        self.sweep_at = sweep_at.max(1);
        self
    }

    pub fn get(&self, jid: &str) -> Option<GroupMetadata> {
        let mut entries = self.entries.lock();
        match entries.get(jid) {
            Some((meta, at)) if at.elapsed() < self.ttl => Some(meta.clone()),
            Some(_) => {
                entries.remove(jid);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, meta: GroupMetadata) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.sweep_at {
            let before = entries.len();
            entries.retain(|_, (_, at)| at.elapsed() < self.ttl);
            debug!(swept = before - entries.len(), "swept expired group metadata");
        }
        entries.insert(meta.jid.clone(), (meta, Instant::now()));
    }

    pub fn invalidate(&self, jid: &str) {
        if self.entries.lock().remove(jid).is_some() {
            debug!(group = jid, "group metadata invalidated");
        }
    }

    /// 先查缓存，未命中时调用 fetch 并在成功后写入
    /// Consult the cache, fall back to `fetch` on a miss, populate on success
    pub async fn get_or_fetch<F, Fut, E>(&self, jid: &str, fetch: F) -> Result<GroupMetadata, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GroupMetadata, E>>,
    {
        if let Some(hit) = self.get(jid) {
            return Ok(hit);
        }
        let meta = fetch().await?;
        self.insert(meta.clone());
        Ok(meta)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
