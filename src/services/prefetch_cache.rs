//! 预取缓存 - 业务能力层
//!
//! `CacheKey → DetailPayload` 的会话级缓存。只做纯内存查找，从不发起请求。
//! 会话内不淘汰，只有重新获取会覆盖已有条目。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::models::{CacheKey, DetailPayload};

/// 预取缓存（克隆后共享同一份数据）
#[derive(Clone, Default)]
pub struct PrefetchCache {
    entries: Arc<Mutex<HashMap<CacheKey, DetailPayload>>>,
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<DetailPayload> {
        match self.entries.lock() {
            Ok(entries) => entries.get(key).cloned(),
            Err(e) => {
                warn!("缓存锁已损坏: {}", e);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, payload: DetailPayload) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key, payload);
            }
            Err(e) => warn!("缓存锁已损坏，丢弃 {}: {}", key, e),
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(npsn: &str) -> DetailPayload {
        serde_json::from_value(serde_json::json!({ "summary": { "npsn": npsn } })).unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let cache = PrefetchCache::new();
        let key = CacheKey::new("101", "ORD-1");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), payload("101"));
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().summary.npsn, "101");
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = PrefetchCache::new();
        let other = cache.clone();
        other.put(CacheKey::new("7", "A"), payload("7"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = PrefetchCache::new();
        let key = CacheKey::new("101", "ORD-1");
        cache.put(key.clone(), payload("101"));
        let mut newer = payload("101");
        newer.extracted_id = "fresh".to_string();
        cache.put(key.clone(), newer);
        assert_eq!(cache.get(&key).unwrap().extracted_id, "fresh");
        assert_eq!(cache.len(), 1);
    }
}
