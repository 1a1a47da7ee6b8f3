//! Camera Gate - 接收摄像头线检测事件，命中目标时限流通知闸机网关

pub mod config;
pub mod detection;
pub mod error;
pub mod event;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod preview;
pub mod server;

pub use config::{GateConfig, FileConfig};
pub use detection::{evaluate, AllowedTargets, MatchResult, LINE_DETECTION};
pub use error::{ConfigError, ParseError, SendError};
pub use event::{parse_captured, CameraEvent, DetectionRegion, FilePart, InboundRequest, PayloadNormalizer, RawPayload};
pub use notification::{GateNotifier, GateOutcome, HttpGateNotifier, HttpNotifierConfig, NotificationGate, NotifyMethod};
pub use pipeline::{Evaluation, EventPipeline};
pub use server::{router, serve, AppState};
