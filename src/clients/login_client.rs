/// 登录中转客户端
use async_trait::async_trait;
use serde_json::json;

use crate::clients::{LoginApi, LoginResponse};
use crate::error::AppResult;
use crate::infrastructure::RelayClient;
use crate::models::SystemKind;

const LOGIN_ENDPOINT: &str = "/api/auth/login";

pub struct LoginClient {
    relay: RelayClient,
}

impl LoginClient {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl LoginApi for LoginClient {
    async fn login(&self, username: &str, password: &str, system: SystemKind) -> AppResult<LoginResponse> {
        let body = json!({
            "username": username,
            "password": password,
            "type": system.code(),
        });
        self.relay.post_as(LOGIN_ENDPOINT, &body).await
    }
}
