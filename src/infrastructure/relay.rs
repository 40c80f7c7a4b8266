//! 中转客户端 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端，只暴露"向本地中转服务发 JSON 请求"的能力

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 中转客户端
///
/// 职责：
/// - 持有唯一的 reqwest Client
/// - 暴露 post_json() / warm() 能力
/// - 不认识 Task / Approval
/// - 不处理业务流程
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    /// 创建新的中转客户端
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 发送 JSON 请求并返回原始 JSON
    ///
    /// # 参数
    /// - `endpoint`: 以 `/` 开头的中转路径
    /// - `body`: 请求体
    pub async fn post_json<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> AppResult<JsonValue> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let value: JsonValue = response
            .json()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        if value.is_null() {
            return Err(crate::error::ApiError::EmptyResponse {
                endpoint: endpoint.to_string(),
            }
            .into());
        }
        Ok(value)
    }

    /// 发送 JSON 请求并反序列化为指定类型
    pub async fn post_as<B: Serialize + ?Sized, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> AppResult<T> {
        let value = self.post_json(endpoint, body).await?;
        let typed = serde_json::from_value(value)?;
        Ok(typed)
    }

    /// 预热一个资源地址（读完即丢弃）
    pub async fn warm(&self, url: &str) -> AppResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;
        response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;
        Ok(())
    }
}

/// 媒体预加载能力
#[async_trait]
pub trait MediaPreloader: Send + Sync {
    async fn preload(&self, url: &str) -> AppResult<()>;
}

#[async_trait]
impl MediaPreloader for RelayClient {
    async fn preload(&self, url: &str) -> AppResult<()> {
        self.warm(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let relay = RelayClient::new("http://localhost:3000/");
        assert_eq!(relay.base_url(), "http://localhost:3000");
    }
}
