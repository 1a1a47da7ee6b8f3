//! 错误类型定义
//!
//! - `ParseError`: 载荷缺失或格式错误，对摄像头返回 400，不重试
//! - `SendError`: 出站调用失败（含未配置），只记录日志，不影响入站响应
//! - `ConfigError`: 配置值无法解析

use thiserror::Error;

/// 载荷解析错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// 三种提取方式都没有拿到数据
    #[error("No linedetection data provided")]
    NoData,
    /// XML 文本无法解析（含非 UTF-8 内容）
    #[error("invalid XML: {0}")]
    InvalidXml(String),
    /// XML 根元素不是 EventNotificationAlert
    #[error("missing EventNotificationAlert root element")]
    MissingRoot,
    /// 事件缺少 eventType
    #[error("missing eventType")]
    MissingEventType,
    /// 字段类型或结构不符合预期
    #[error("invalid event shape: {0}")]
    InvalidShape(String),
    /// 既不是文本也不是 JSON 对象
    #[error("Unsupported data format")]
    UnsupportedFormat,
}

/// 出站通知错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    /// GATE_LINK 未配置，跳过发送
    #[error("gate link not configured")]
    NotConfigured,
    /// 请求超时
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    /// 网络或客户端错误
    #[error("HTTP request failed: {0}")]
    Http(String),
    /// 网关返回非 2xx
    #[error("gate responded with status {0}")]
    Status(u16),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
