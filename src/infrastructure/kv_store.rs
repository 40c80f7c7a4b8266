//! 本地键值存储 - 基础设施层
//!
//! 只负责"字符串键 → JSON 值"的读写，不关心存的是什么

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// 键值存储
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<JsonValue>;
    fn set(&self, key: &str, value: JsonValue) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// 纯内存存储（测试和无状态运行使用）
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::Other(format!("存储锁已损坏: {}", e)))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::Other(format!("存储锁已损坏: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}

/// 单个 JSON 文件持久化的存储
///
/// 内存中保留一份完整副本，每次写入都整体落盘
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl JsonFileStore {
    /// 打开存储文件；文件不存在时从空开始，内容损坏时记录警告并从空开始
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| AppError::store_read_failed(path.display().to_string(), e))?;
            match serde_json::from_str::<HashMap<String, JsonValue>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("⚠️ 存储文件 {} 无法解析，将重新创建: {}", path.display(), e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };
        debug!("打开存储 {}，共 {} 个键", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, JsonValue>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)
            .map_err(|e| AppError::store_write_failed(self.path.display().to_string(), e))
    }

    fn update(&self, apply: impl FnOnce(&mut HashMap<String, JsonValue>)) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AppError::Other(format!("存储锁已损坏: {}", e)))?;
        apply(&mut entries);
        self.persist(&entries)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: JsonValue) -> AppResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bapp_verifier_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        let store = JsonFileStore::open(&path).unwrap();
        store.set("dac_session", json!("tok-1")).unwrap();
        store.set("login_cache_dac", json!({"username": "u", "password": "p"})).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("dac_session"), Some(json!("tok-1")));
        reopened.remove("dac_session").unwrap();
        assert_eq!(reopened.get("dac_session"), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything"), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", json!(1)).unwrap();
        assert_eq!(store.get("k"), Some(json!(1)));
    }
}
