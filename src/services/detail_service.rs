//! 详情服务 - 业务能力层
//!
//! 只负责"取一条任务的详情"，缓存优先

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::AuthorityApi;
use crate::error::AppResult;
use crate::infrastructure::MediaPreloader;
use crate::models::{DetailPayload, SystemKind, Task};
use crate::services::{CredentialStore, PrefetchCache};

/// 详情服务
///
/// 职责：
/// - 选中任务时优先命中缓存
/// - 重新获取时绕过缓存并覆盖
/// - 预取下一条并预热媒体
/// - 不关心队列游标
#[derive(Clone)]
pub struct DetailService {
    authority: Arc<dyn AuthorityApi>,
    credentials: CredentialStore,
    cache: PrefetchCache,
    preloader: Option<Arc<dyn MediaPreloader>>,
}

impl DetailService {
    pub fn new(authority: Arc<dyn AuthorityApi>, credentials: CredentialStore, cache: PrefetchCache) -> Self {
        Self {
            authority,
            credentials,
            cache,
            preloader: None,
        }
    }

    /// 设置媒体预加载器
    pub fn with_preloader(mut self, preloader: Arc<dyn MediaPreloader>) -> Self {
        self.preloader = Some(preloader);
        self
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.cache
    }

    /// 选中任务：缓存命中且属于该任务时直接返回，否则请求并写入缓存
    pub async fn select(&self, task: &Task) -> AppResult<DetailPayload> {
        if let Some(cached) = self.cached_for(task) {
            debug!("{} 命中缓存", task);
            return Ok(cached);
        }
        self.fetch_and_store(task).await
    }

    /// 重新获取：总是请求，成功后覆盖缓存
    pub async fn refetch(&self, task: &Task) -> AppResult<DetailPayload> {
        info!("🔄 {} 重新获取详情", task);
        self.fetch_and_store(task).await
    }

    /// 预取一条任务；已缓存时不请求。返回是否成功拿到详情
    pub async fn prefetch(&self, task: &Task) -> bool {
        if self.cache.contains(&task.cache_key()) {
            return true;
        }
        match self.fetch_and_store(task).await {
            Ok(detail) => {
                debug!("{} 预取完成", task);
                self.preload_media(&detail);
                true
            }
            Err(e) => {
                warn!("{} 预取失败: {}", task, e);
                false
            }
        }
    }

    /// 只读缓存，不发请求
    pub fn cached_for(&self, task: &Task) -> Option<DetailPayload> {
        self.cache
            .get(&task.cache_key())
            .filter(|detail| belongs_to(detail, task))
    }

    async fn fetch_and_store(&self, task: &Task) -> AppResult<DetailPayload> {
        let session = self.credentials.require_session(SystemKind::Authority)?;
        let detail = self
            .authority
            .get_detail(&task.npsn, &task.order_id, &session)
            .await?;
        self.cache.put(task.cache_key(), detail.clone());
        Ok(detail)
    }

    /// 媒体预热：逐个后台请求，结果忽略
    fn preload_media(&self, detail: &DetailPayload) {
        let Some(preloader) = &self.preloader else {
            return;
        };
        for url in detail.media_urls() {
            let preloader = Arc::clone(preloader);
            tokio::spawn(async move {
                if let Err(e) = preloader.preload(&url).await {
                    debug!("媒体预热失败 {}: {}", url, e);
                }
            });
        }
    }
}

/// 摘要中的学校编号缺失或与任务一致
fn belongs_to(detail: &DetailPayload, task: &Task) -> bool {
    detail.summary.npsn.is_empty() || detail.summary.npsn == task.npsn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::MemoryStore;
    use crate::models::ApprovalPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuthority {
        calls: AtomicUsize,
        summary_npsn: String,
    }

    #[async_trait]
    impl AuthorityApi for CountingAuthority {
        async fn get_detail(&self, _npsn: &str, _order_id: &str, _session: &str) -> AppResult<DetailPayload> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut detail: DetailPayload =
                serde_json::from_value(serde_json::json!({ "summary": { "npsn": self.summary_npsn } }))?;
            detail.extracted_id = format!("call-{}", n);
            Ok(detail)
        }

        async fn save_approval(&self, _payload: &ApprovalPayload) -> AppResult<()> {
            Err(AppError::Other("unused".to_string()))
        }
    }

    fn task(npsn: &str) -> Task {
        serde_json::from_value(serde_json::json!({ "npsn": npsn, "no_bapp": "ORD" })).unwrap()
    }

    fn service(summary_npsn: &str) -> (DetailService, Arc<CountingAuthority>) {
        let authority = Arc::new(CountingAuthority {
            calls: AtomicUsize::new(0),
            summary_npsn: summary_npsn.to_string(),
        });
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        credentials.set_session_token(SystemKind::Authority, "tok").unwrap();
        let svc = DetailService::new(authority.clone(), credentials, PrefetchCache::new());
        (svc, authority)
    }

    #[tokio::test]
    async fn test_select_twice_hits_network_once() {
        let (svc, authority) = service("101");
        let first = svc.select(&task("101")).await.unwrap();
        let second = svc.select(&task("101")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetch_overwrites_cache() {
        let (svc, authority) = service("101");
        svc.select(&task("101")).await.unwrap();
        let fresh = svc.refetch(&task("101")).await.unwrap();
        assert_eq!(fresh.extracted_id, "call-1");
        assert_eq!(svc.cached_for(&task("101")).unwrap().extracted_id, "call-1");
        assert_eq!(authority.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mismatched_cache_entry_is_refetched() {
        let (svc, authority) = service("999");
        svc.select(&task("101")).await.unwrap();
        svc.select(&task("101")).await.unwrap();
        assert_eq!(authority.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_session_is_error() {
        let authority = Arc::new(CountingAuthority {
            calls: AtomicUsize::new(0),
            summary_npsn: String::new(),
        });
        let svc = DetailService::new(
            authority,
            CredentialStore::new(Arc::new(MemoryStore::new())),
            PrefetchCache::new(),
        );
        assert!(svc.select(&task("101")).await.is_err());
        assert!(!svc.prefetch(&task("101")).await);
    }
}
