//! 集成测试共用的外部系统替身
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bapp_verifier::clients::{AuthorityApi, DataSourceApi, FormMarkup, LoginApi, LoginData, LoginResponse, SubmitResponse};
use bapp_verifier::config::Config;
use bapp_verifier::error::{AppError, AppResult};
use bapp_verifier::infrastructure::{KeyValueStore, MemoryStore, RegexExtractor};
use bapp_verifier::models::{ApprovalPayload, Credentials, DetailPayload, SubmissionPayload, SystemKind, Task};
use bapp_verifier::orchestrator::{Collaborators, VerifierSession};
use bapp_verifier::services::CredentialStore;
use bapp_verifier::workflow::RetryPolicy;

pub const FORM_HTML: &str = r#"
<select name="geo_tag"><option value="">-</option><option value="Sesuai">Sesuai</option><option value="Tidak Sesuai">Tidak</option></select>
<select name="bc_bapp_sn"><option value="Ada">Ada</option><option value="Tidak ada">Tidak</option></select>
"#;

/// 数据源替身：前 `fail_first` 次提交返回 success=false
#[derive(Default)]
pub struct FakeDataSource {
    pub tasks: Vec<Task>,
    pub view_html: Option<String>,
    pub form_html: Option<String>,
    pub fail_first: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub submitted: Mutex<Vec<SubmissionPayload>>,
}

#[async_trait]
impl DataSourceApi for FakeDataSource {
    async fn scrape(&self, _session: &str) -> AppResult<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    async fn submit(&self, payload: &SubmissionPayload, _session: &str) -> AppResult<SubmitResponse> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Ok(SubmitResponse {
                success: false,
                message: Some("server busy".to_string()),
            });
        }
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(SubmitResponse {
            success: true,
            message: None,
        })
    }

    async fn view_form(&self, _record_id: &str, _session: &str) -> AppResult<FormMarkup> {
        Ok(FormMarkup {
            success: self.view_html.is_some(),
            html: self.view_html.clone(),
            ..Default::default()
        })
    }

    async fn get_form(&self, _action_id: &str, _session: &str) -> AppResult<FormMarkup> {
        Ok(FormMarkup {
            success: self.form_html.is_some(),
            html: self.form_html.clone(),
            id_user: "77".to_string(),
            message: None,
        })
    }
}

/// 权威系统替身
#[derive(Default)]
pub struct FakeAuthority {
    pub details: HashMap<String, DetailPayload>,
    pub detail_calls: AtomicUsize,
    pub fail_save: AtomicBool,
    pub saved: Mutex<Vec<ApprovalPayload>>,
}

impl FakeAuthority {
    pub fn with_details(npsns: &[&str]) -> Self {
        Self {
            details: npsns
                .iter()
                .map(|n| (n.to_string(), detail(n, &format!("X{}", n))))
                .collect(),
            ..Default::default()
        }
    }

    pub fn saved(&self) -> Vec<ApprovalPayload> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorityApi for FakeAuthority {
    async fn get_detail(&self, npsn: &str, _order_id: &str, _session: &str) -> AppResult<DetailPayload> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .get(npsn)
            .cloned()
            .ok_or_else(|| AppError::bad_response("/api/get-detail", Some("not found".to_string())))
    }

    async fn save_approval(&self, payload: &ApprovalPayload) -> AppResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(AppError::bad_response("/api/save-approval", Some("locked".to_string())));
        }
        self.saved.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// 登录替身：`token` 为 None 时中转不可用
#[derive(Default)]
pub struct FakeLogin {
    pub token: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeLogin {
    pub fn returning(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..Default::default()
        }
    }

    pub fn down() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginApi for FakeLogin {
    async fn login(&self, _username: &str, _password: &str, system: SystemKind) -> AppResult<LoginResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(token) = self.token.clone() else {
            return Err(AppError::Other("relay unreachable".to_string()));
        };
        Ok(match system {
            SystemKind::Authority => LoginResponse {
                success: true,
                data: Some(LoginData { token: Some(token) }),
                ..Default::default()
            },
            SystemKind::DataSource => LoginResponse {
                success: true,
                cookie: Some(format!("ci_session={}; path=/", token)),
                ..Default::default()
            },
        })
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
    .unwrap()
}

pub fn detail(npsn: &str, extracted_id: &str) -> DetailPayload {
    serde_json::from_value(serde_json::json!({
        "summary": { "npsn": npsn, "bapp_id": format!("B{}", npsn), "school_name": "SD Negeri 1" },
        "awb": {
            "OrderID": format!("AWB-{}", npsn),
            "ListPhotoJSON": { "unit": format!("https://img.test/{}/unit.jpg", npsn) },
            "History": [ { "date": "2026-01-07T08:30:00" } ]
        },
        "extractedId": extracted_id,
    }))
    .unwrap()
}

/// 两个系统都已登录的存储
pub fn logged_in_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let creds = CredentialStore::new(store.clone());
    creds.set_session_token(SystemKind::Authority, "dac-token").unwrap();
    creds.set_session_token(SystemKind::DataSource, "ds-token").unwrap();
    store
}

pub fn remember_credentials(store: &Arc<MemoryStore>, system: SystemKind) {
    CredentialStore::new(store.clone())
        .set_credentials(system, &Credentials::new("verif", "rahasia"))
        .unwrap();
}

/// 保持抓取顺序、不跳过、不冷却
pub fn test_config() -> Config {
    Config {
        reverse_queue: true,
        skip_leading: 0,
        retry_delay_ms: 0,
        fast_path_cooldown_ms: 0,
        ..Config::default()
    }
}

pub fn session(
    config: Config,
    data_source: Arc<FakeDataSource>,
    authority: Arc<FakeAuthority>,
    login: Arc<FakeLogin>,
    store: Arc<dyn KeyValueStore>,
) -> VerifierSession {
    VerifierSession::new(
        config,
        Collaborators {
            data_source,
            authority,
            login,
            store,
            extractor: Arc::new(RegexExtractor::new()),
            preloader: None,
        },
    )
    .with_retry_policy(RetryPolicy::immediate())
}
