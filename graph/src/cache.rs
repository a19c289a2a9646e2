//! Memoization for transitive closures (§4.4), invalidated by a generation
//! counter bumped whenever a touched file changes. Readers compare the
//! generation at read time against the generation the entry was built
//! under, per the reader-preferring-lock pattern in §5.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use smartctx_store::Direction;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitiveKey {
    pub path: String,
    pub direction: Direction,
    pub max_depth: u32,
}

pub struct TransitiveCache {
    generation: AtomicU64,
    entries: RwLock<HashMap<TransitiveKey, (u64, HashSet<String>)>>,
}

impl TransitiveCache {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Bump the generation, invalidating every memoized closure. Called
    /// whenever the indexer touches a file (§4.3/§4.4).
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn get(&self, key: &TransitiveKey) -> Option<HashSet<String>> {
        let gen_now = self.current_generation();
        let entries = self.entries.read().await;
        entries.get(key).and_then(|(gen_at, set)| {
            if *gen_at == gen_now {
                Some(set.clone())
            } else {
                None
            }
        })
    }

    pub async fn put(&self, key: TransitiveKey, value: HashSet<String>) {
        let gen_now = self.current_generation();
        let mut entries = self.entries.write().await;
        entries.insert(key, (gen_now, value));
    }
}

impl Default for TransitiveCache {
    fn default() -> Self {
        Self::new()
    }
}
