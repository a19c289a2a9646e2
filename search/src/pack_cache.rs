//! Evidence-pack cache (§3, §4.7 step 1/10, §10.5 eviction policy).
//!
//! A pack is served from cache iff it hasn't expired and every item's
//! staleness token still matches the chunk's current content hash (§3
//! invariant, testable property 3). Eviction is LRU by `created_at`,
//! bounded by `EVIDENCE_PACK_CACHE_SIZE` (§10.5 — the spec gives a size
//! bound but not a policy). At most one build per `pack_id` runs
//! concurrently (§4.7 concurrency); later identical queries wait for the
//! first to finish and observe the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use smartctx_error::Result;
use smartctx_store::EvidencePack;
use smartctx_store::PackRole;
use smartctx_store::Store;
use tokio::sync::Mutex;

pub struct PackCache {
    store: Arc<Store>,
    capacity: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PackCache {
    pub fn new(store: Arc<Store>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn key_lock(&self, pack_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(pack_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Returns the cached pack iff it is unexpired and every staleness
    /// token still matches; otherwise evicts it (if present) and returns
    /// `None`.
    pub async fn fresh(&self, pack_id: &str, now_ms: i64) -> Result<Option<EvidencePack>> {
        let pack = match self.store.get_pack(pack_id).await? {
            Some(p) => p,
            None => return Ok(None),
        };
        if pack.expires_at <= now_ms {
            self.store.evict_pack(pack_id).await?;
            return Ok(None);
        }
        // Non-`Result` items (e.g. the degradation sentinel a pipeline may
        // attach) carry no real chunk and are not subject to staleness
        // checks.
        for item in pack.items.iter().filter(|i| i.role == PackRole::Result) {
            match self.store.get_content_hash(&item.chunk_id).await? {
                Some(hash) if hash == item.staleness_token => {}
                _ => {
                    self.store.evict_pack(pack_id).await?;
                    return Ok(None);
                }
            }
        }
        Ok(Some(pack))
    }

    async fn store_pack(&self, pack: EvidencePack) -> Result<()> {
        self.store.upsert_pack(pack).await?;
        while self.store.pack_count().await? > self.capacity as u64 {
            match self.store.oldest_pack_id().await? {
                Some(oldest) => self.store.evict_pack(&oldest).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Serves a fresh cached pack if one exists; otherwise runs `build`
    /// under a per-`pack_id` lock (so concurrent identical queries wait for
    /// the first build rather than racing), writes the result through to
    /// the store, and returns it. The bool is `true` on a cache hit.
    pub async fn get_or_build<F, Fut>(&self, pack_id: &str, now_ms: i64, build: F) -> Result<(EvidencePack, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EvidencePack>>,
    {
        if let Some(pack) = self.fresh(pack_id, now_ms).await? {
            return Ok((pack, true));
        }
        let lock = self.key_lock(pack_id).await;
        let _guard = lock.lock().await;
        if let Some(pack) = self.fresh(pack_id, now_ms).await? {
            return Ok((pack, true));
        }
        let pack = build().await?;
        self.store_pack(pack.clone()).await?;
        Ok((pack, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_store::PackItem;
    use smartctx_store::PackRole;

    fn sample_pack(id: &str, created_at: i64, expires_at: i64) -> EvidencePack {
        EvidencePack {
            pack_id: id.to_string(),
            created_at,
            expires_at,
            items: vec![],
        }
    }

    #[tokio::test]
    async fn serves_cached_pack_when_unexpired() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cache = PackCache::new(store, 10);
        let (pack, hit) = cache
            .get_or_build("p1", 1_000, || async { Ok(sample_pack("p1", 1_000, 2_000)) })
            .await
            .unwrap();
        assert!(!hit);
        assert_eq!(pack.pack_id, "p1");
        let (_pack2, hit2) = cache
            .get_or_build("p1", 1_500, || async { panic!("should not rebuild") })
            .await
            .unwrap();
        assert!(hit2);
    }

    #[tokio::test]
    async fn expired_pack_triggers_rebuild() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cache = PackCache::new(store, 10);
        cache
            .get_or_build("p1", 1_000, || async { Ok(sample_pack("p1", 1_000, 1_100)) })
            .await
            .unwrap();
        let (_pack, hit) = cache
            .get_or_build("p1", 2_000, || async { Ok(sample_pack("p1", 2_000, 3_000)) })
            .await
            .unwrap();
        assert!(!hit);
    }

    #[tokio::test]
    async fn stale_chunk_hash_triggers_rebuild() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut pack = sample_pack("p1", 1_000, 99_999);
        pack.items.push(PackItem {
            role: PackRole::Result,
            rank: 0,
            chunk_id: "missing-chunk".into(),
            range: smartctx_store::LineRange::new(1, 1),
            section_path: vec![],
            preview: "x".into(),
            scores: serde_json::json!({}),
            staleness_token: "h1".into(),
        });
        store.upsert_pack(pack).await.unwrap();
        let cache = PackCache::new(store, 10);
        let (_pack, hit) = cache
            .get_or_build("p1", 1_500, || async { Ok(sample_pack("p1", 1_500, 99_999)) })
            .await
            .unwrap();
        assert!(!hit);
    }

    #[tokio::test]
    async fn eviction_bounds_cache_size() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cache = PackCache::new(store.clone(), 2);
        for i in 0..4 {
            let id = format!("p{i}");
            let build_id = id.clone();
            cache
                .get_or_build(&id, i as i64, || async move { Ok(sample_pack(&build_id, i as i64, 999_999)) })
                .await
                .unwrap();
        }
        assert!(store.pack_count().await.unwrap() <= 2);
    }
}
