//! 凭据存储 - 业务能力层
//!
//! 显式的凭据与会话令牌存储，在构造时注入会话和提交编排器。
//! 底层是一个键值存储，键名沿用 `login_cache_{type}` / `{type}_session`。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::clients::{LoginApi, LoginResponse};
use crate::error::{AppResult, BusinessError};
use crate::infrastructure::KeyValueStore;
use crate::models::{Credentials, SystemKind};

/// 旧版本保存权威系统令牌使用的键
const LEGACY_SESSION_KEY: &str = "ci_session";
const USERNAME_KEY: &str = "username";

/// 刷新结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// 登录成功并保存了新令牌
    Refreshed(String),
    /// 没有缓存的用户名密码
    NoCredentials,
    /// 登录失败或响应中没有令牌
    LoginFailed(String),
}

/// 凭据存储
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// 把旧键 `ci_session` 迁移到 `dac_session`（仅当新键不存在时）
    pub fn migrate_legacy(&self) -> AppResult<()> {
        let Some(old) = self.store.get(LEGACY_SESSION_KEY) else {
            return Ok(());
        };
        let new_key = SystemKind::Authority.session_key();
        if self.store.get(&new_key).is_none() {
            info!("迁移旧会话键 {} → {}", LEGACY_SESSION_KEY, new_key);
            self.store.set(&new_key, old)?;
            self.store.remove(LEGACY_SESSION_KEY)?;
        }
        Ok(())
    }

    pub fn credentials(&self, system: SystemKind) -> Option<Credentials> {
        let value = self.store.get(&system.credentials_key())?;
        match serde_json::from_value::<Credentials>(value) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!("{} 的缓存凭据无法解析: {}", system, e);
                None
            }
        }
    }

    pub fn set_credentials(&self, system: SystemKind, credentials: &Credentials) -> AppResult<()> {
        self.store
            .set(&system.credentials_key(), serde_json::to_value(credentials)?)
    }

    pub fn username(&self, system: SystemKind) -> Option<String> {
        self.credentials(system)
            .map(|c| c.username)
            .filter(|u| !u.is_empty())
    }

    pub fn session_token(&self, system: SystemKind) -> Option<String> {
        match self.store.get(&system.session_key())? {
            JsonValue::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// 当前令牌；不存在时报错
    pub fn require_session(&self, system: SystemKind) -> AppResult<String> {
        self.session_token(system).ok_or_else(|| {
            BusinessError::MissingSession {
                system: system.to_string(),
            }
            .into()
        })
    }

    pub fn set_session_token(&self, system: SystemKind, token: &str) -> AppResult<()> {
        self.store
            .set(&system.session_key(), JsonValue::String(token.to_string()))
    }

    /// 用缓存的凭据重新登录并就地替换令牌
    ///
    /// 任何失败都不会报错，调用方继续使用原有令牌
    pub async fn refresh(&self, system: SystemKind, login: &dyn LoginApi) -> RefreshOutcome {
        let Some(creds) = self.credentials(system).filter(Credentials::is_usable) else {
            debug!("{} 没有缓存凭据，跳过刷新", system);
            return RefreshOutcome::NoCredentials;
        };

        let response = match login.login(&creds.username, &creds.password, system).await {
            Ok(resp) => resp,
            Err(e) => return RefreshOutcome::LoginFailed(e.to_string()),
        };
        if !response.success {
            return RefreshOutcome::LoginFailed(response.message.unwrap_or_else(|| "success=false".to_string()));
        }
        let Some(token) = extract_session_token(system, &response) else {
            return RefreshOutcome::LoginFailed("响应中没有令牌".to_string());
        };
        if let Err(e) = self.set_session_token(system, &token) {
            // 内存中的新令牌仍然可以用于本次写入
            warn!("保存 {} 新令牌失败: {}", system, e);
        }
        info!("🔑 {} 会话已刷新", system);
        RefreshOutcome::Refreshed(token)
    }

    /// 显式登录：成功后缓存用户名密码和令牌
    pub async fn login(&self, system: SystemKind, credentials: Credentials, login: &dyn LoginApi) -> AppResult<String> {
        let response = login
            .login(&credentials.username, &credentials.password, system)
            .await?;
        let token = if response.success {
            extract_session_token(system, &response)
        } else {
            None
        };
        let Some(token) = token else {
            return Err(BusinessError::LoginFailed {
                system: system.to_string(),
                message: response.message.unwrap_or_else(|| "没有返回令牌".to_string()),
            }
            .into());
        };

        self.set_credentials(system, &credentials)?;
        self.set_session_token(system, &token)?;
        if system == SystemKind::Authority {
            self.store
                .set(USERNAME_KEY, JsonValue::String(credentials.username.clone()))?;
        }
        info!("✓ {} 登录成功: {}", system, credentials.username);
        Ok(token)
    }

    /// 启动时的会话检查：有缓存凭据就刷新，否则只要已有令牌就视为已登录
    pub async fn bootstrap(&self, system: SystemKind, login: &dyn LoginApi) -> bool {
        match self.refresh(system, login).await {
            RefreshOutcome::Refreshed(_) => true,
            RefreshOutcome::NoCredentials => self.session_token(system).is_some(),
            RefreshOutcome::LoginFailed(reason) => {
                warn!("⚠️ {} 自动刷新失败: {}", system, reason);
                false
            }
        }
    }
}

/// 从登录响应中取出令牌
///
/// 权威系统优先取 `data.token`，否则取 cookie 中的 `token=` 段；
/// 数据源取 cookie 中的 `token=` 或 `ci_session=` 段。都没有时退回整段 cookie。
pub fn extract_session_token(system: SystemKind, response: &LoginResponse) -> Option<String> {
    if system == SystemKind::Authority {
        if let Some(token) = response
            .data
            .as_ref()
            .and_then(|d| d.token.as_deref())
            .filter(|t| !t.is_empty())
        {
            return Some(token.to_string());
        }
    }

    let cookie = response.cookie.as_deref().filter(|c| !c.is_empty())?;
    let re = match system {
        SystemKind::Authority => authority_cookie_re(),
        SystemKind::DataSource => data_source_cookie_re(),
    };
    let token = re
        .captures(cookie)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .unwrap_or(cookie);
    Some(token.to_string())
}

fn authority_cookie_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"token=([^;]+)").expect("valid token regex"))
}

fn data_source_cookie_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:token|ci_session)=([^;]+)").expect("valid session regex"))
}
