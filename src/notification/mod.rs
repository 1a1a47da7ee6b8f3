//! 网关通知 - 限流闸门 + 出站调用
//!
//! # 使用示例
//! ```ignore
//! use camera_gate::notification::{HttpGateNotifier, HttpNotifierConfig, NotificationGate, GateNotifier};
//!
//! let gate = NotificationGate::new(Duration::from_secs(60));
//! let notifier = HttpGateNotifier::new(HttpNotifierConfig::default())?;
//! let outcome = gate.try_notify(&event, |e| notifier.send(e)).await;
//! ```

pub mod gate;
pub mod notifier;
pub mod payload;

pub use gate::{Clock, GateOutcome, ManualClock, NotificationGate, SystemClock, DEFAULT_MIN_INTERVAL_MS};
pub use notifier::{GateNotifier, HttpGateNotifier, HttpNotifierConfig, NotifyMethod, DEFAULT_TIMEOUT_MS};
pub use payload::GatePayload;
