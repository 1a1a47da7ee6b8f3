//! 集成测试共用的工具

#![allow(dead_code)]

use async_trait::async_trait;
use camera_gate::{
    AllowedTargets, CameraEvent, EventPipeline, GateNotifier, NotificationGate, PayloadNormalizer,
    SendError,
};
use camera_gate::notification::ManualClock;
use camera_gate::event::DEFAULT_FIELD;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::subscriber::DefaultGuard;

pub const VEHICLE_XML: &str = "<EventNotificationAlert><eventType>linedetection</eventType>\
<DetectionRegionList><DetectionRegionEntry><regionID>1</regionID>\
<detectionTarget>vehicle</detectionTarget></DetectionRegionEntry>\
</DetectionRegionList></EventNotificationAlert>";

pub const HUMAN_XML: &str = "<EventNotificationAlert><eventType>linedetection</eventType>\
<DetectionRegionList><DetectionRegionEntry><regionID>1</regionID>\
<detectionTarget>human</detectionTarget></DetectionRegionEntry>\
</DetectionRegionList></EventNotificationAlert>";

/// 记录每次调用的通知器
pub struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
    fail: bool,
    tx: mpsc::UnboundedSender<String>,
}

impl RecordingNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(false)
    }

    /// 每次发送都返回失败
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail,
            tx,
        });
        (notifier, rx)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GateNotifier for RecordingNotifier {
    fn target(&self) -> Option<&str> {
        Some("recording://gate")
    }

    async fn send(&self, event: &CameraEvent) -> Result<(), SendError> {
        self.calls.lock().unwrap().push(event.event_type.clone());
        let _ = self.tx.send(event.event_type.clone());
        if self.fail {
            Err(SendError::Status(503))
        } else {
            Ok(())
        }
    }
}

/// 使用手动时钟与给定通知器的流水线
pub fn pipeline_with(
    notifier: Arc<dyn GateNotifier>,
    targets: &str,
    min_interval: Duration,
    clock: Arc<ManualClock>,
) -> EventPipeline {
    EventPipeline::new(
        PayloadNormalizer::new(DEFAULT_FIELD).unwrap(),
        AllowedTargets::parse(targets),
        NotificationGate::with_clock(min_interval, clock),
        notifier,
    )
}

/// 收集当前线程的日志输出（需配合单线程 runtime）
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// 安装为当前线程的默认 subscriber，guard 释放后恢复
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    /// 指定级别的日志行
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().nth(1) == Some(level))
            .map(str::to_string)
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
