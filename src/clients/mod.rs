//! 外部系统客户端
//!
//! 两个外部系统和登录中转各自是一个 trait，管线只依赖 trait；
//! 这里的实现都通过 `RelayClient` 访问本地中转服务。

pub mod authority_client;
pub mod data_source_client;
pub mod login_client;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::task::deserialize_lenient_string;
use crate::models::{ApprovalPayload, DetailPayload, SubmissionPayload, SystemKind, Task};

pub use authority_client::AuthorityClient;
pub use data_source_client::DataSourceClient;
pub use login_client::LoginClient;

/// 中转服务的通用响应外壳
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// 提交结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// 数据源返回的表单 HTML
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormMarkup {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub id_user: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl FormMarkup {
    /// 成功且带有 HTML 时返回 HTML
    pub fn markup(&self) -> Option<&str> {
        if self.success {
            self.html.as_deref().filter(|h| !h.is_empty())
        } else {
            None
        }
    }
}

/// 登录结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<LoginData>,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
}

/// 数据源系统
#[async_trait]
pub trait DataSourceApi: Send + Sync {
    /// 抓取任务列表（未过滤）
    async fn scrape(&self, session: &str) -> AppResult<Vec<Task>>;
    /// 提交评估结果；success=false 以 Ok 返回，由调用方决定是否重试
    async fn submit(&self, payload: &SubmissionPayload, session: &str) -> AppResult<SubmitResponse>;
    /// 查看刚提交记录的表单
    async fn view_form(&self, record_id: &str, session: &str) -> AppResult<FormMarkup>;
    /// 获取评估表单定义
    async fn get_form(&self, action_id: &str, session: &str) -> AppResult<FormMarkup>;
}

/// 权威系统
#[async_trait]
pub trait AuthorityApi: Send + Sync {
    async fn get_detail(&self, npsn: &str, order_id: &str, session: &str) -> AppResult<DetailPayload>;
    async fn save_approval(&self, payload: &ApprovalPayload) -> AppResult<()>;
}

/// 登录中转
#[async_trait]
pub trait LoginApi: Send + Sync {
    async fn login(&self, username: &str, password: &str, system: SystemKind) -> AppResult<LoginResponse>;
}
