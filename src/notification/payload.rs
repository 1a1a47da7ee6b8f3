//! 出站通知载荷（POST 模式）
//!
//! ```json
//! {
//!   "timestamp": "2026-10-19T08:00:00Z",
//!   "eventType": "linedetection",
//!   "eventState": "active",
//!   "eventDescription": "linedetection alarm",
//!   "detectionData": [ { "regionID": 1, "detectionTarget": "vehicle", ... } ]
//! }
//! ```

use crate::event::{CameraEvent, DetectionRegion};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 发送给网关的 JSON 载荷
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePayload {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_state: Option<String>,
    pub event_description: Option<String>,
    pub detection_data: Vec<DetectionRegion>,
}

impl GatePayload {
    pub fn from_event(event: &CameraEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event_type: event.event_type.clone(),
            event_state: event.event_state.clone(),
            event_description: event.event_description.clone(),
            detection_data: event.detection_regions.clone(),
        }
    }
}
