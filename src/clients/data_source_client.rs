/// 数据源 API 客户端
///
/// 封装所有与数据源中转接口相关的调用逻辑
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::clients::{DataSourceApi, Envelope, FormMarkup, SubmitResponse};
use crate::error::{AppError, AppResult};
use crate::infrastructure::RelayClient;
use crate::models::{SubmissionPayload, Task};

const SCRAPE_ENDPOINT: &str = "/api/datasource/scrape";
const SUBMIT_ENDPOINT: &str = "/api/datasource/submit";
const VIEW_FORM_ENDPOINT: &str = "/api/datasource/view-form";
const GET_FORM_ENDPOINT: &str = "/api/get-form";

/// 数据源客户端
pub struct DataSourceClient {
    relay: RelayClient,
}

impl DataSourceClient {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl DataSourceApi for DataSourceClient {
    async fn scrape(&self, session: &str) -> AppResult<Vec<Task>> {
        let envelope: Envelope<Vec<Task>> = self
            .relay
            .post_as(SCRAPE_ENDPOINT, &json!({ "cookie": session }))
            .await?;

        if !envelope.success {
            return Err(AppError::bad_response(SCRAPE_ENDPOINT, envelope.message));
        }
        let tasks = envelope.data.unwrap_or_default();
        debug!("抓取到 {} 条原始任务", tasks.len());
        Ok(tasks)
    }

    async fn submit(&self, payload: &SubmissionPayload, session: &str) -> AppResult<SubmitResponse> {
        debug!("提交 Payload: npsn={} id_update={}", payload.npsn, payload.id_update);
        self.relay
            .post_as(SUBMIT_ENDPOINT, &json!({ "payload": payload, "cookie": session }))
            .await
    }

    async fn view_form(&self, record_id: &str, session: &str) -> AppResult<FormMarkup> {
        self.relay
            .post_as(VIEW_FORM_ENDPOINT, &json!({ "id": record_id, "cookie": session }))
            .await
    }

    async fn get_form(&self, action_id: &str, session: &str) -> AppResult<FormMarkup> {
        self.relay
            .post_as(GET_FORM_ENDPOINT, &json!({ "id": action_id, "cookie": session }))
            .await
    }
}
