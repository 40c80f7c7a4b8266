//! 单元测试共用的外部系统替身

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::clients::{AuthorityApi, DataSourceApi, FormMarkup, LoginApi, LoginResponse, SubmitResponse};
use crate::error::{AppError, AppResult};
use crate::models::{ApprovalPayload, DetailPayload, SubmissionPayload, SystemKind, Task};

/// 数据源替身：前 `submit_failures` 次提交返回 success=false
#[derive(Default)]
pub struct StubDataSource {
    pub tasks: Vec<Task>,
    pub form: FormMarkup,
    pub view: FormMarkup,
    pub submit_failures: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub submitted: Mutex<Vec<SubmissionPayload>>,
}

#[async_trait]
impl DataSourceApi for StubDataSource {
    async fn scrape(&self, _session: &str) -> AppResult<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    async fn submit(&self, payload: &SubmissionPayload, _session: &str) -> AppResult<SubmitResponse> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.submit_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.submit_failures.store(remaining - 1, Ordering::SeqCst);
            return Ok(SubmitResponse {
                success: false,
                message: Some("busy".to_string()),
            });
        }
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(payload.clone());
        }
        Ok(SubmitResponse {
            success: true,
            message: None,
        })
    }

    async fn view_form(&self, _record_id: &str, _session: &str) -> AppResult<FormMarkup> {
        Ok(self.view.clone())
    }

    async fn get_form(&self, _action_id: &str, _session: &str) -> AppResult<FormMarkup> {
        Ok(self.form.clone())
    }
}

/// 权威系统替身：按学校编号返回详情并记录审批写入
#[derive(Default)]
pub struct StubAuthority {
    pub details: HashMap<String, DetailPayload>,
    pub detail_calls: AtomicUsize,
    pub saved: Mutex<Vec<ApprovalPayload>>,
}

#[async_trait]
impl AuthorityApi for StubAuthority {
    async fn get_detail(&self, npsn: &str, _order_id: &str, _session: &str) -> AppResult<DetailPayload> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .get(npsn)
            .cloned()
            .ok_or_else(|| AppError::bad_response("/api/get-detail", Some("not found".to_string())))
    }

    async fn save_approval(&self, payload: &ApprovalPayload) -> AppResult<()> {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(payload.clone());
        }
        Ok(())
    }
}

/// 登录替身：None 表示中转不可用
#[derive(Default)]
pub struct StubLogin {
    pub response: Option<LoginResponse>,
}

#[async_trait]
impl LoginApi for StubLogin {
    async fn login(&self, _username: &str, _password: &str, _system: SystemKind) -> AppResult<LoginResponse> {
        self.response
            .clone()
            .ok_or_else(|| AppError::Other("relay down".to_string()))
    }
}

pub fn task(npsn: &str, serial: &str) -> Task {
    serde_json::from_value(serde_json::json!({
        "npsn": npsn,
        "no_bapp": format!("ORD-{}", npsn),
        "serial_number": serial,
        "action_id": format!("A{}", npsn),
        "bapp": format!("BAPP/{}", npsn),
        "type": "Zyrex",
        "status": "PROSES",
    }))
    .unwrap_or_else(|e| panic!("bad task fixture: {}", e))
}

pub fn detail(npsn: &str, extracted_id: &str) -> DetailPayload {
    serde_json::from_value(serde_json::json!({
        "summary": { "npsn": npsn, "bapp_id": format!("B{}", npsn) },
        "awb": {
            "OrderID": format!("AWB-{}", npsn),
            "History": [ { "date": "2026-01-07T08:30:00" } ]
        },
        "extractedId": extracted_id,
    }))
    .unwrap_or_else(|e| panic!("bad detail fixture: {}", e))
}
