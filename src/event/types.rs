//! 摄像头事件的规范化记录
//!
//! 摄像头推送的载荷类型很松散（XML 转换后的数字/字符串混用、单个区域不包成数组），
//! 这里负责把 `serde_json::Value` 收敛成强类型的 `CameraEvent`，之后的逻辑不再接触原始结构。

use crate::error::ParseError;
use serde::Serialize;
use serde_json::{Map, Value};

/// XML 根元素名，同时也是 JSON 包装键
pub const ROOT_ELEMENT: &str = "EventNotificationAlert";

/// 摄像头事件（规范化后）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraEvent {
    /// 事件类型，如 "linedetection"
    pub event_type: String,
    pub event_state: Option<String>,
    pub event_description: Option<String>,
    pub active_post_count: Option<i64>,
    pub channel_name: Option<String>,
    #[serde(rename = "channelID")]
    pub channel_id: Option<i64>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub date_time: Option<String>,
    pub detection_picture_trans_type: Option<String>,
    pub detection_pictures_number: Option<i64>,
    pub is_data_retransmission: Option<bool>,
    /// 检测区域，保持源顺序
    pub detection_regions: Vec<DetectionRegion>,
}

/// 检测区域
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRegion {
    #[serde(rename = "regionID")]
    pub region_id: i64,
    pub sensitivity_level: Option<i64>,
    /// 原始大小写，仅用于日志；比较请用 [`DetectionRegion::target_key`]
    pub detection_target: String,
    pub target_rect: Option<TargetRect>,
    pub coordinates: Vec<Coordinate>,
}

impl DetectionRegion {
    /// 用于匹配的小写目标名
    pub fn target_key(&self) -> String {
        self.detection_target.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl CameraEvent {
    /// 只有事件类型的空事件（测试通知等场景）
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            event_state: None,
            event_description: None,
            active_post_count: None,
            channel_name: None,
            channel_id: None,
            ip_address: None,
            mac_address: None,
            date_time: None,
            detection_picture_trans_type: None,
            detection_pictures_number: None,
            is_data_retransmission: None,
            detection_regions: Vec::new(),
        }
    }

    /// 从 JSON 结构构建事件
    ///
    /// 接受两种形状：事件对象本身，或 `{"EventNotificationAlert": {...}}` 包装。
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let obj = value.as_object().ok_or(ParseError::UnsupportedFormat)?;
        let obj = match obj.get(ROOT_ELEMENT) {
            Some(Value::Object(inner)) => inner,
            Some(_) => return Err(shape(ROOT_ELEMENT, "expected an object")),
            None => obj,
        };

        let event_type = match opt_string(obj, "eventType")? {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(ParseError::MissingEventType),
        };

        let detection_regions = match obj.get("DetectionRegionList") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
            // 部分固件的 JSON 直接给出区域数组
            Some(list @ Value::Array(_)) => parse_regions(list)?,
            Some(Value::Object(list)) => match list.get("DetectionRegionEntry") {
                Some(entries) => parse_regions(entries)?,
                None => Vec::new(),
            },
            Some(_) => return Err(shape("DetectionRegionList", "expected an object")),
        };

        Ok(Self {
            event_type,
            event_state: opt_string(obj, "eventState")?,
            event_description: opt_string(obj, "eventDescription")?,
            active_post_count: opt_int(obj, "activePostCount")?,
            channel_name: opt_string(obj, "channelName")?,
            channel_id: opt_int(obj, "channelID")?,
            ip_address: opt_string(obj, "ipAddress")?,
            mac_address: opt_string(obj, "macAddress")?,
            date_time: opt_string(obj, "dateTime")?,
            detection_picture_trans_type: opt_string(obj, "detectionPictureTransType")?,
            detection_pictures_number: opt_int(obj, "detectionPicturesNumber")?,
            is_data_retransmission: opt_bool(obj, "isDataRetransmission")?,
            detection_regions,
        })
    }
}

fn parse_regions(entries: &Value) -> Result<Vec<DetectionRegion>, ParseError> {
    one_or_many(entries, "DetectionRegionEntry")?
        .into_iter()
        .map(parse_region)
        .collect()
}

fn parse_region(value: &Value) -> Result<DetectionRegion, ParseError> {
    let obj = value
        .as_object()
        .ok_or_else(|| shape("DetectionRegionEntry", "expected an object"))?;

    let region_id = opt_int(obj, "regionID")?.ok_or_else(|| shape("regionID", "missing"))?;

    let target_rect = match obj.get("TargetRect") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::Object(rect)) => Some(TargetRect {
            x: required_f64(rect, "X")?,
            y: required_f64(rect, "Y")?,
            width: required_f64(rect, "width")?,
            height: required_f64(rect, "height")?,
        }),
        Some(_) => return Err(shape("TargetRect", "expected an object")),
    };

    let coordinates = match obj.get("RegionCoordinatesList") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(Value::Object(list)) => match list.get("RegionCoordinates") {
            Some(points) => one_or_many(points, "RegionCoordinates")?
                .into_iter()
                .map(parse_coordinate)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        },
        Some(_) => return Err(shape("RegionCoordinatesList", "expected an object")),
    };

    Ok(DetectionRegion {
        region_id,
        sensitivity_level: opt_int(obj, "sensitivityLevel")?,
        detection_target: opt_string(obj, "detectionTarget")?.unwrap_or_default(),
        target_rect,
        coordinates,
    })
}

fn parse_coordinate(value: &Value) -> Result<Coordinate, ParseError> {
    let obj = value
        .as_object()
        .ok_or_else(|| shape("RegionCoordinates", "expected an object"))?;
    Ok(Coordinate {
        x: required_f64(obj, "positionX")?,
        y: required_f64(obj, "positionY")?,
    })
}

/// 单个对象视为一个元素的序列；空字符串（空元素）视为空序列
fn one_or_many<'a>(value: &'a Value, field: &str) -> Result<Vec<&'a Value>, ParseError> {
    match value {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(_) => Ok(vec![value]),
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        _ => Err(shape(field, "expected an object or a list")),
    }
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        // XML 读取时会把数字样式的文本转成数字，这里还原成文本
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(shape(key, "expected a scalar")),
    }
}

fn opt_int(obj: &Map<String, Value>, key: &str) -> Result<Option<i64>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(shape(key, "expected an integer")),
                }
            }
        }
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| shape(key, "expected an integer")),
        Some(_) => Err(shape(key, "expected an integer")),
    }
}

fn opt_f64(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| shape(key, "expected a number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| shape(key, "expected a number")),
        Some(_) => Err(shape(key, "expected a number")),
    }
}

fn required_f64(obj: &Map<String, Value>, key: &str) -> Result<f64, ParseError> {
    opt_f64(obj, key)?.ok_or_else(|| shape(key, "missing"))
}

fn opt_bool(obj: &Map<String, Value>, key: &str) -> Result<Option<bool>, ParseError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) if s == "true" => Ok(Some(true)),
        Some(Value::String(s)) if s == "false" => Ok(Some(false)),
        Some(_) => Err(shape(key, "expected a boolean")),
    }
}

fn shape(field: &str, reason: &str) -> ParseError {
    ParseError::InvalidShape(format!("{}: {}", field, reason))
}
