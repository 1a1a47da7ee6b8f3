//! 配置加载
//!
//! 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值。
//!
//! 配置文件默认位于 `~/.config/camera-gate/config.json`（JSON 格式）：
//! ```json
//! {
//!   "gate_link": "http://gate.local/open",
//!   "notify_method": "post",
//!   "allowed_targets": ["vehicle", "truck"],
//!   "min_interval_ms": 60000
//! }
//! ```

use crate::detection::AllowedTargets;
use crate::error::ConfigError;
use crate::notification::{HttpNotifierConfig, NotifyMethod, DEFAULT_MIN_INTERVAL_MS, DEFAULT_TIMEOUT_MS};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// 运行配置
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// 网关地址；`None` 表示不发送通知
    pub gate_link: Option<String>,
    pub notify_method: NotifyMethod,
    pub allowed_targets: AllowedTargets,
    pub min_interval: Duration,
    pub notify_timeout: Duration,
    pub bind: SocketAddr,
    pub max_body_bytes: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            gate_link: None,
            notify_method: NotifyMethod::default(),
            allowed_targets: AllowedTargets::default(),
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            notify_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// 白名单在文件中可以写成逗号分隔的字符串或数组
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetList {
    Csv(String),
    List(Vec<String>),
}

impl TargetList {
    fn into_allowed(self) -> AllowedTargets {
        match self {
            TargetList::Csv(s) => AllowedTargets::parse(&s),
            TargetList::List(items) => AllowedTargets::new(items),
        }
    }
}

/// 配置文件内容（所有字段可选）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gate_link: Option<String>,
    pub notify_method: Option<NotifyMethod>,
    pub allowed_targets: Option<TargetList>,
    pub min_interval_ms: Option<u64>,
    pub notify_timeout_ms: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_body_bytes: Option<usize>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// 默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("camera-gate").join("config.json"))
}

impl GateConfig {
    /// 从配置文件和进程环境加载
    ///
    /// 显式指定的文件必须存在；默认路径的文件不存在时忽略。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => FileConfig::read(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    debug!(path = %path.display(), "Loading default config file");
                    FileConfig::read(&path)?
                }
                _ => FileConfig::default(),
            },
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// 合并配置文件与环境变量（`env` 便于测试注入）
    pub fn from_sources<E>(file: FileConfig, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        // 空字符串视为未设置
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let gate_link = env("GATE_LINK")
            .or(file.gate_link)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let notify_method = match env("NOTIFY_METHOD") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NOTIFY_METHOD",
                value: v,
            })?,
            None => file.notify_method.unwrap_or(defaults.notify_method),
        };

        let allowed_targets = match env("ALLOWED_TARGETS") {
            Some(v) => AllowedTargets::parse(&v),
            None => file
                .allowed_targets
                .map(TargetList::into_allowed)
                .unwrap_or(defaults.allowed_targets),
        };

        let min_interval_ms = parse_env(&env, "MIN_INTERVAL_MS")?
            .or(file.min_interval_ms)
            .unwrap_or(DEFAULT_MIN_INTERVAL_MS);

        let notify_timeout_ms = parse_env(&env, "NOTIFY_TIMEOUT_MS")?
            .or(file.notify_timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        // 0 会导致请求立即超时，按默认值处理
        let notify_timeout_ms = if notify_timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            notify_timeout_ms
        };

        let host = env("HOST").or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "HOST",
                value: host.clone(),
            })?;
        let port = parse_env::<u16, _>(&env, "PORT")?.or(file.port).unwrap_or(DEFAULT_PORT);
        let bind = SocketAddr::new(ip, port);

        let max_body_bytes = parse_env(&env, "MAX_BODY_BYTES")?
            .or(file.max_body_bytes)
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Ok(Self {
            gate_link,
            notify_method,
            allowed_targets,
            min_interval: Duration::from_millis(min_interval_ms),
            notify_timeout: Duration::from_millis(notify_timeout_ms),
            bind,
            max_body_bytes,
        })
    }

    /// 通知器配置
    pub fn notifier_config(&self) -> HttpNotifierConfig {
        HttpNotifierConfig {
            gate_link: self.gate_link.clone(),
            method: self.notify_method,
            timeout: self.notify_timeout,
        }
    }
}

fn parse_env<T, E>(env: &E, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    E: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
        None => Ok(None),
    }
}
