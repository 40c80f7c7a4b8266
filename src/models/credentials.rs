use std::fmt;

use serde::{Deserialize, Serialize};

/// 需要独立登录的外部系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    /// 权威系统（审批记录）
    #[serde(rename = "dac")]
    Authority,
    /// 数据源系统（任务队列、评估表单）
    #[serde(rename = "datasource")]
    DataSource,
}

impl SystemKind {
    /// 中转服务登录接口使用的类型标识，同时也是存储键前缀
    pub fn code(self) -> &'static str {
        match self {
            SystemKind::Authority => "dac",
            SystemKind::DataSource => "datasource",
        }
    }

    /// 凭据缓存键
    pub fn credentials_key(self) -> String {
        format!("login_cache_{}", self.code())
    }

    /// 会话令牌键
    pub fn session_key(self) -> String {
        format!("{}_session", self.code())
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemKind::Authority => write!(f, "权威系统"),
            SystemKind::DataSource => write!(f, "数据源"),
        }
    }
}

/// 用户名和密码
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 用户名和密码都不为空才可用于登录
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

// 密码不进日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_keys() {
        assert_eq!(SystemKind::Authority.credentials_key(), "login_cache_dac");
        assert_eq!(SystemKind::DataSource.session_key(), "datasource_session");
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("verifikator", "rahasia");
        assert!(!format!("{:?}", creds).contains("rahasia"));
    }
}
