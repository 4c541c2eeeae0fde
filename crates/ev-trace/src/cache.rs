//! Cache for derived trace views.
//!
//! Grouping is deterministic, so a view only changes when new spans arrive:
//! cache_key = hash(sorted(run_ids), span_count)

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Bounded, thread-safe cache. The oldest entry is evicted first.
pub struct SummaryCache<V> {
    capacity: usize,
    inner: Mutex<Entries<V>>,
}

struct Entries<V> {
    map: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V: Clone> SummaryCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.inner.lock().ok()?;
        entries.map.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: V) {
        let Ok(mut entries) = self.inner.lock() else {
            tracing::warn!("summary cache lock poisoned; skipping insert");
            return;
        };
        if entries.map.insert(key.clone(), value).is_none() {
            entries.order.push_back(key);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute a cache key from the run ids and how many spans they currently have.
pub fn compute_cache_key(run_ids: &[String], span_count: usize) -> String {
    let mut ids: Vec<&str> = run_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(span_count.to_le_bytes());
    hex::encode(hasher.finalize())
}
