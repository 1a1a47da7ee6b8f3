//! 网关通知器 - 执行一次出站 HTTP 调用
//!
//! 不重试；失败只向上报告并记录日志（目标 URL 和事件类型，不含载荷内容）。

use super::payload::GatePayload;
use crate::error::SendError;
use crate::event::CameraEvent;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

/// 默认超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// 出站通知的抽象，便于测试替换
#[async_trait]
pub trait GateNotifier: Send + Sync {
    /// 目标地址（未配置时为 `None`）
    fn target(&self) -> Option<&str>;

    /// 发送一次通知
    async fn send(&self, event: &CameraEvent) -> Result<(), SendError>;
}

/// 请求方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMethod {
    /// 无请求体的 GET
    #[default]
    Get,
    /// 携带 JSON 摘要的 POST
    Post,
}

impl NotifyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyMethod::Get => "GET",
            NotifyMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for NotifyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotifyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "get" => Ok(NotifyMethod::Get),
            "post" => Ok(NotifyMethod::Post),
            other => Err(format!("unknown notify method: {}", other)),
        }
    }
}

/// HTTP 通知器配置
#[derive(Debug, Clone)]
pub struct HttpNotifierConfig {
    /// 网关地址（GATE_LINK），为空表示不发送
    pub gate_link: Option<String>,
    pub method: NotifyMethod,
    pub timeout: Duration,
}

impl Default for HttpNotifierConfig {
    fn default() -> Self {
        Self {
            gate_link: None,
            method: NotifyMethod::Get,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// 基于 reqwest 的网关通知器
#[derive(Debug)]
pub struct HttpGateNotifier {
    client: Client,
    config: HttpNotifierConfig,
}

impl HttpGateNotifier {
    pub fn new(config: HttpNotifierConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SendError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn method(&self) -> NotifyMethod {
        self.config.method
    }

    fn map_error(&self, e: reqwest::Error) -> SendError {
        if e.is_timeout() {
            SendError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            SendError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl GateNotifier for HttpGateNotifier {
    fn target(&self) -> Option<&str> {
        self.config.gate_link.as_deref()
    }

    async fn send(&self, event: &CameraEvent) -> Result<(), SendError> {
        let Some(url) = self.target() else {
            warn!(event_type = %event.event_type, "GATE_LINK not configured, skipping notification");
            return Err(SendError::NotConfigured);
        };

        let request = match self.config.method {
            NotifyMethod::Get => self.client.get(url),
            NotifyMethod::Post => self
                .client
                .post(url)
                .json(&GatePayload::from_event(event, Utc::now())),
        };

        let result = match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!(
                    target_url = %url,
                    method = %self.config.method,
                    response_status = response.status().as_u16(),
                    event_type = %event.event_type,
                    "Gate notification sent successfully"
                );
                Ok(())
            }
            Ok(response) => Err(SendError::Status(response.status().as_u16())),
            Err(e) => Err(self.map_error(e)),
        };

        if let Err(e) = &result {
            error!(
                target_url = %url,
                method = %self.config.method,
                event_type = %event.event_type,
                error = %e,
                "Failed to send gate notification"
            );
        }

        result
    }
}
