//! 通知闸门 - 限制两次通知之间的最小间隔
//!
//! 判断、发送、更新时间戳在同一把异步锁内完成，
//! 并发到达的多个事件不会同时通过间隔检查。
//! 发送失败不更新时间戳，下一个事件可以立即重试。

use crate::error::SendError;
use crate::event::CameraEvent;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// 默认最小间隔（毫秒）
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 60_000;

/// 时钟抽象，测试中可手动推进
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动时钟
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// 向前推进
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

/// 闸门结果
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// 已发送
    Sent,
    /// 距上次发送不足最小间隔，未调用发送
    SkippedTooFrequent,
    /// 发送失败（不影响下次尝试）
    SendFailed(String),
    /// 网关地址未配置（不影响下次尝试）
    NotConfigured,
}

/// 最近一次成功发送
#[derive(Debug, Clone, Copy)]
struct SentMark {
    at: Instant,
    wall: DateTime<Utc>,
}

/// 通知闸门
pub struct NotificationGate {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_sent: AsyncMutex<Option<SentMark>>,
}

impl NotificationGate {
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        info!(min_interval_ms = min_interval.as_millis() as u64, "Notification gate initialized");
        Self {
            min_interval,
            clock,
            last_sent: AsyncMutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 最近一次成功发送的时间
    pub async fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent.lock().await.map(|mark| mark.wall)
    }

    /// 在间隔允许时调用 `send`
    ///
    /// 锁一直持有到 `send` 完成，`send` 必须自带超时。
    pub async fn try_notify<'a, F, Fut>(&self, event: &'a CameraEvent, send: F) -> GateOutcome
    where
        F: FnOnce(&'a CameraEvent) -> Fut,
        Fut: Future<Output = Result<(), SendError>>,
    {
        let mut last_sent = self.last_sent.lock().await;

        if let Some(mark) = *last_sent {
            let elapsed = self.clock.now().saturating_duration_since(mark.at);
            if elapsed < self.min_interval {
                warn!(
                    last_sent_at = %mark.wall.to_rfc3339(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    min_interval_ms = self.min_interval.as_millis() as u64,
                    event_type = %event.event_type,
                    "Notification skipped - too frequent"
                );
                return GateOutcome::SkippedTooFrequent;
            }
        }

        match send(event).await {
            Ok(()) => {
                let mark = SentMark {
                    at: self.clock.now(),
                    wall: Utc::now(),
                };
                *last_sent = Some(mark);
                debug!(sent_at = %mark.wall.to_rfc3339(), "Notification gate updated");
                GateOutcome::Sent
            }
            Err(SendError::NotConfigured) => GateOutcome::NotConfigured,
            Err(e) => {
                debug!(error = %e, event_type = %event.event_type, "Notification failed, gate left open for retry");
                GateOutcome::SendFailed(e.to_string())
            }
        }
    }
}
