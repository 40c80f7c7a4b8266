/// 权威系统 API 客户端
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::clients::{AuthorityApi, Envelope};
use crate::error::{AppError, AppResult};
use crate::infrastructure::RelayClient;
use crate::models::{ApprovalPayload, DetailPayload};

const DETAIL_ENDPOINT: &str = "/api/get-detail";
const SAVE_APPROVAL_ENDPOINT: &str = "/api/save-approval";

/// 权威系统客户端
pub struct AuthorityClient {
    relay: RelayClient,
}

impl AuthorityClient {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl AuthorityApi for AuthorityClient {
    async fn get_detail(&self, npsn: &str, order_id: &str, session: &str) -> AppResult<DetailPayload> {
        let body = json!({
            "npsn": npsn,
            "session_id": session,
            "no_bapp": order_id,
        });
        let envelope: Envelope<DetailPayload> = self.relay.post_as(DETAIL_ENDPOINT, &body).await?;

        match envelope {
            Envelope {
                success: true,
                data: Some(detail),
                ..
            } => Ok(detail),
            Envelope { message, .. } => Err(AppError::bad_response(DETAIL_ENDPOINT, message)),
        }
    }

    async fn save_approval(&self, payload: &ApprovalPayload) -> AppResult<()> {
        debug!("保存审批: id={} status={}", payload.extracted_id, payload.status);
        let envelope: Envelope<serde_json::Value> =
            self.relay.post_as(SAVE_APPROVAL_ENDPOINT, payload).await?;

        if envelope.success {
            Ok(())
        } else {
            Err(AppError::bad_response(SAVE_APPROVAL_ENDPOINT, envelope.message))
        }
    }
}
