use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 配置文件默认路径
pub const DEFAULT_CONFIG_FILE: &str = "verifier.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 本地中转服务地址
    pub relay_base_url: String,
    /// 本地键值存储文件（凭据缓存、队列快照）
    pub store_path: String,
    /// 只处理此类型的任务
    pub task_kind: String,
    /// 只处理此状态的任务
    pub task_status: String,
    /// 是否按原始顺序处理（默认先处理最旧的任务）
    pub reverse_queue: bool,
    /// 过滤后丢弃的前导条目数
    pub skip_leading: usize,
    /// 工作窗口大小
    pub window_size: usize,
    /// 提交失败后的固定等待时间（毫秒）
    pub retry_delay_ms: u64,
    /// 快速通道提交后按钮恢复的间隔（毫秒）
    pub fast_path_cooldown_ms: u64,
    /// 每个任务开始时是否启用人工备注
    pub manual_note_default: bool,
    /// 优先使用本地保存的队列快照
    pub prefer_cached_queue: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_base_url: "http://localhost:3000".to_string(),
            store_path: "verifier_store.json".to_string(),
            task_kind: "Zyrex".to_string(),
            task_status: "PROSES".to_string(),
            reverse_queue: false,
            skip_leading: 1,
            window_size: 50,
            retry_delay_ms: 2000,
            fast_path_cooldown_ms: 500,
            manual_note_default: false,
            prefer_cached_queue: false,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 加载配置：配置文件（可选）+ 环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("VERIFIER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    /// 只从环境变量读取，缺省值来自 `Default`
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取，缺少的字段使用默认值
    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| {
            ConfigError::TomlParseFailed {
                path: path.to_string(),
                source,
            }
            .into()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        Ok(Self {
            relay_base_url: std::env::var("RELAY_BASE_URL").unwrap_or(self.relay_base_url),
            store_path: std::env::var("STORE_PATH").unwrap_or(self.store_path),
            task_kind: std::env::var("TASK_KIND").unwrap_or(self.task_kind),
            task_status: std::env::var("TASK_STATUS").unwrap_or(self.task_status),
            reverse_queue: env_parse("REVERSE_QUEUE", "bool")?.unwrap_or(self.reverse_queue),
            skip_leading: env_parse("SKIP_LEADING", "usize")?.unwrap_or(self.skip_leading),
            window_size: env_parse("WINDOW_SIZE", "usize")?.unwrap_or(self.window_size),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", "u64")?.unwrap_or(self.retry_delay_ms),
            fast_path_cooldown_ms: env_parse("FAST_PATH_COOLDOWN_MS", "u64")?
                .unwrap_or(self.fast_path_cooldown_ms),
            manual_note_default: env_parse("MANUAL_NOTE_DEFAULT", "bool")?
                .unwrap_or(self.manual_note_default),
            prefer_cached_queue: env_parse("PREFER_CACHED_QUEUE", "bool")?
                .unwrap_or(self.prefer_cached_queue),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn fast_path_cooldown(&self) -> Duration {
        Duration::from_millis(self.fast_path_cooldown_ms)
    }
}

/// 读取并解析环境变量；不存在时返回 None，格式错误时报错
fn env_parse<T: std::str::FromStr>(var_name: &str, expected_type: &str) -> AppResult<Option<T>> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_working_window() {
        let config = Config::default();
        assert_eq!(config.skip_leading, 1);
        assert_eq!(config.window_size, 50);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            relay_base_url = "http://relay.local:8080"
            reverse_queue = true
            skip_leading = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.relay_base_url, "http://relay.local:8080");
        assert!(config.reverse_queue);
        assert_eq!(config.skip_leading, 0);
        assert_eq!(config.task_kind, "Zyrex");
        assert_eq!(config.window_size, 50);
    }

    #[test]
    fn test_bad_toml_is_rejected() {
        assert!(Config::from_toml_str("window_size = \"many\"").is_err());
    }
}
