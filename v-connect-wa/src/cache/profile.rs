use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::PictureTier;

type Key = (String, PictureTier);

/// 超过此条目数时写入会清扫过期项 / Inserts sweep expired entries past this many entries
const SWEEP_THRESHOLD: usize = 4096;

/// 头像URL缓存；"无头像" 同样按TTL缓存
/// Profile picture URL cache; a confirmed "no picture" is cached with the same TTL
pub struct ProfilePictureCache {
    ttl: Duration,
    sweep_at: usize,
    entries: Mutex<HashMap<Key, (Option<String>, Instant)>>,
}

impl ProfilePictureCache {
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

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 外层 None 表示未命中；内层 None 表示已确认无头像
    /// Outer None is a miss; inner None is a cached "no picture"
    pub fn get(&self, jid: &str, tier: PictureTier) -> Option<Option<String>> {
        let key = (jid.to_string(), tier);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some((url, at)) if at.elapsed() < self.ttl => Some(url.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, jid: &str, tier: PictureTier, url: Option<String>) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.sweep_at {
            let before = entries.len();
            entries.retain(|_, (_, at)| at.elapsed() < self.ttl);
            debug!(swept = before - entries.len(), "swept expired profile pictures");
        }
        entries.insert((jid.to_string(), tier), (url, Instant::now()));
    }

    /// 读穿透；查询失败降级为 None 且不缓存
    /// Read-through; lookup failures degrade to None and are not cached
    pub async fn resolve<F, Fut, E>(&self, jid: &str, tier: PictureTier, fetch: F) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: std::fmt::Display,
    {
        if let Some(hit) = self.get(jid, tier) {
            return hit;
        }
        match fetch().await {
            Ok(url) => {
                self.insert(jid, tier, url.clone());
                url
            }
            Err(e) => {
                warn!(jid, error = %e, "profile picture lookup failed");
                None
            }
        }
    }

    /// 固定大小批次顺序处理，批内并发 / Fixed-size batches run sequentially, concurrent within a batch
    pub async fn resolve_batch<F, Fut, E>(
        &self,
        jids: &[String],
        tier: PictureTier,
        batch_size: usize,
        fetch: F,
    ) -> BTreeMap<String, Option<String>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: std::fmt::Display,
    {
        let mut out = BTreeMap::new();
        for (i, batch) in jids.chunks(batch_size.max(1)).enumerate() {
            debug!(batch = i, size = batch.len(), "resolving profile picture batch");
            let results = join_all(
                batch
                    .iter()
                    .map(|jid| self.resolve(jid, tier, || fetch(jid.clone()))),
            )
            .await;
            for (jid, url) in batch.iter().zip(results) {
                out.insert(jid.clone(), url);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_negative_result_cached_until_ttl() {
        let cache = ProfilePictureCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch = {
            let calls = calls.clone();
            move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<Option<String>, String>(None)
                }
            }
        };

        assert_eq!(cache.resolve("5511@s.whatsapp.net", PictureTier::Preview, fetch.clone()).await, None);
        assert_eq!(cache.get("5511@s.whatsapp.net", PictureTier::Preview), Some(None));
        cache.resolve("5511@s.whatsapp.net", PictureTier::Preview, fetch.clone()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 超过TTL视为未命中并重新查询 / Older than TTL is a miss and refetches
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("5511@s.whatsapp.net", PictureTier::Preview), None);
        cache.resolve("5511@s.whatsapp.net", PictureTier::Preview, fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_expired_entries() {
        let cache = ProfilePictureCache::new(Duration::from_secs(30)).with_sweep_threshold(3);
        for i in 0..3 {
            cache.insert(&format!("55{}@s.whatsapp.net", i), PictureTier::Preview, None);
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        // 未过期时不清扫 / Nothing is swept while entries are fresh
        cache.insert("fresh@s.whatsapp.net", PictureTier::Preview, None);
        assert_eq!(cache.len(), 4);

        tokio::time::advance(Duration::from_secs(25)).await;
        cache.insert("late@s.whatsapp.net", PictureTier::Image, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("fresh@s.whatsapp.net", PictureTier::Preview), Some(None));
    }

    #[tokio::test]
    async fn test_tiers_are_independent_and_errors_not_cached() {
        let cache = ProfilePictureCache::new(Duration::from_secs(30));
        cache.insert("a@s.whatsapp.net", PictureTier::Image, Some("https://pps/a".into()));
        assert_eq!(cache.get("a@s.whatsapp.net", PictureTier::Preview), None);

        let url = cache
            .resolve("a@s.whatsapp.net", PictureTier::Preview, || async {
                Err::<Option<String>, _>("rate limited")
            })
            .await;
        assert_eq!(url, None);
        assert_eq!(cache.get("a@s.whatsapp.net", PictureTier::Preview), None);
    }

    #[tokio::test]
    async fn test_batch_resolution_limits_concurrency() {
        let cache = ProfilePictureCache::new(Duration::from_secs(30));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jids: Vec<String> = (0..7).map(|i| format!("55{}@s.whatsapp.net", i)).collect();

        let result = cache
            .resolve_batch(&jids, PictureTier::Preview, 3, |jid| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(Some(format!("https://pps/{}", jid)))
                }
            })
            .await;

        assert_eq!(result.len(), 7);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(
            result["550@s.whatsapp.net"].as_deref(),
            Some("https://pps/550@s.whatsapp.net")
        );
    }
}
