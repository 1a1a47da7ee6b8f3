//! 载荷规范化 - 提取 + 解析，输出 `CameraEvent`
//!
//! 全有或全无：要么返回完整的事件记录，要么返回 `ParseError`。

use super::extract::{
    BodyFieldStrategy, ExtractionStrategy, InboundRequest, MultipartFileStrategy, RawPayload,
    XmlFragmentStrategy,
};
use super::types::{CameraEvent, ROOT_ELEMENT};
use super::xml;
use crate::error::ParseError;
use crate::preview::{safe_preview, safe_preview_bytes};
use tracing::{debug, warn};

/// 默认的字段名 / multipart 文件名
pub const DEFAULT_FIELD: &str = "linedetection";

/// 载荷规范化器
pub struct PayloadNormalizer {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PayloadNormalizer {
    /// 标准策略顺序：请求体字段 → multipart 文件 → 原始文本中的 XML 片段
    pub fn new(field: &str) -> Result<Self, regex::Error> {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = Vec::with_capacity(3);
        strategies.push(Box::new(BodyFieldStrategy::new(field)));
        strategies.push(Box::new(MultipartFileStrategy::new(field)));
        strategies.push(Box::new(XmlFragmentStrategy::new(ROOT_ELEMENT)?));
        Ok(Self::with_strategies(strategies))
    }

    /// 自定义策略列表
    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// 依次尝试各策略，返回第一个非空结果
    pub fn extract(&self, request: &InboundRequest) -> Option<RawPayload> {
        self.strategies.iter().find_map(|strategy| {
            let payload = strategy.extract(request)?;
            debug!(strategy = strategy.name(), "Payload extracted");
            Some(payload)
        })
    }

    /// 提取并解析
    pub fn normalize(&self, request: &InboundRequest) -> Result<CameraEvent, ParseError> {
        let payload = self.extract(request).ok_or(ParseError::NoData)?;
        parse_payload(payload)
    }
}

/// 解析单个原始载荷
pub fn parse_payload(payload: RawPayload) -> Result<CameraEvent, ParseError> {
    let result = match &payload {
        RawPayload::Text(text) => parse_text(text),
        RawPayload::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => parse_text(text),
            Err(_) => Err(ParseError::InvalidXml("payload is not valid UTF-8".to_string())),
        },
        RawPayload::Json(value) => CameraEvent::from_value(value),
    };

    if let Err(e) = &result {
        let received = match &payload {
            RawPayload::Text(text) => safe_preview(text),
            RawPayload::Bytes(bytes) => safe_preview_bytes(bytes),
            RawPayload::Json(value) => safe_preview(&value.to_string()),
        };
        warn!(error = %e, received = %received, "Failed to parse camera payload");
    }

    result
}

/// 解析抓取到的一段载荷（CLI 离线检查用）
///
/// 整体解析失败时，再从中搜索 XML 片段。
pub fn parse_captured(bytes: Vec<u8>) -> Result<CameraEvent, ParseError> {
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let first = match parse_payload(RawPayload::Bytes(bytes)) {
        Ok(event) => return Ok(event),
        Err(e) => e,
    };

    let fragment = XmlFragmentStrategy::new(ROOT_ELEMENT)
        .map_err(|e| ParseError::InvalidXml(e.to_string()))?;
    match fragment.extract(&InboundRequest::from_raw_text(text)) {
        Some(payload) => parse_payload(payload),
        None => Err(first),
    }
}

fn parse_text(text: &str) -> Result<CameraEvent, ParseError> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();

    // 个别固件以 JSON 文本放在字段里
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return CameraEvent::from_value(&value);
        }
    }

    let (root, value) = xml::parse_document(trimmed)?;
    if root != ROOT_ELEMENT {
        return Err(ParseError::MissingRoot);
    }
    if !value.is_object() {
        return Err(ParseError::MissingEventType);
    }
    CameraEvent::from_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::extract::FilePart;
    use serde_json::json;

    const SINGLE_VEHICLE: &str = "<EventNotificationAlert><eventType>linedetection</eventType>\
        <DetectionRegionList><DetectionRegionEntry><regionID>1</regionID>\
        <detectionTarget>vehicle</detectionTarget></DetectionRegionEntry>\
        </DetectionRegionList></EventNotificationAlert>";

    fn normalizer() -> PayloadNormalizer {
        PayloadNormalizer::new(DEFAULT_FIELD).unwrap()
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(normalizer().strategy_names(), vec!["body_field", "multipart_file", "xml_fragment"]);
    }

    #[test]
    fn test_body_field_xml() {
        let fields = json!({ "linedetection": SINGLE_VEHICLE });
        let request = InboundRequest::from_fields(fields.as_object().cloned().unwrap());
        let event = normalizer().normalize(&request).unwrap();
        assert_eq!(event.event_type, "linedetection");
        assert_eq!(event.detection_regions.len(), 1);
        assert_eq!(event.detection_regions[0].detection_target, "vehicle");
    }

    #[test]
    fn test_body_field_wins_over_file() {
        let fields = json!({ "linedetection": { "eventType": "fromBody" } });
        let request = InboundRequest::from_fields(fields.as_object().cloned().unwrap())
            .with_file(FilePart::new("linedetection", SINGLE_VEHICLE.as_bytes().to_vec()));
        let event = normalizer().normalize(&request).unwrap();
        assert_eq!(event.event_type, "fromBody");
    }

    #[test]
    fn test_multipart_file() {
        let request = InboundRequest::default()
            .with_file(FilePart::new("linedetection", SINGLE_VEHICLE.as_bytes().to_vec()));
        let event = normalizer().normalize(&request).unwrap();
        assert_eq!(event.detection_regions[0].region_id, 1);
    }

    #[test]
    fn test_raw_fragment() {
        let raw = format!("garbage before\r\n{}\r\ngarbage after", SINGLE_VEHICLE);
        let event = normalizer().normalize(&InboundRequest::from_raw_text(raw)).unwrap();
        assert_eq!(event.event_type, "linedetection");
    }

    #[test]
    fn test_no_data() {
        let request = InboundRequest::from_raw_text("nothing to see");
        assert_eq!(normalizer().normalize(&request), Err(ParseError::NoData));
        assert_eq!(normalizer().normalize(&InboundRequest::default()), Err(ParseError::NoData));
    }

    #[test]
    fn test_non_utf8_file_is_parse_error() {
        let request = InboundRequest::default()
            .with_file(FilePart::new("linedetection", vec![0xFF, 0xFE, 0x00, 0xC3]));
        assert!(matches!(normalizer().normalize(&request), Err(ParseError::InvalidXml(_))));
    }

    #[test]
    fn test_wrong_root_is_parse_error() {
        assert_eq!(
            parse_payload(RawPayload::Text("<Other><eventType>x</eventType></Other>".to_string())),
            Err(ParseError::MissingRoot)
        );
    }

    #[test]
    fn test_scalar_root_has_no_event_type() {
        assert_eq!(
            parse_payload(RawPayload::Text("<EventNotificationAlert>x</EventNotificationAlert>".to_string())),
            Err(ParseError::MissingEventType)
        );
    }

    #[test]
    fn test_json_text_in_field() {
        let event = parse_payload(RawPayload::Text(r#"{"eventType":"linedetection"}"#.to_string())).unwrap();
        assert_eq!(event.event_type, "linedetection");
    }

    #[test]
    fn test_unsupported_json_value() {
        assert_eq!(parse_payload(RawPayload::Json(json!(12))), Err(ParseError::UnsupportedFormat));
    }

    #[test]
    fn test_parse_captured_request_dump() {
        let dump = format!(
            "--MIME_boundary\r\nContent-Type: application/xml\r\n\r\n{}\r\n--MIME_boundary--",
            SINGLE_VEHICLE
        );
        let event = parse_captured(dump.into_bytes()).unwrap();
        assert_eq!(event.detection_regions[0].detection_target, "vehicle");

        assert!(parse_captured(b"no alert here".to_vec()).is_err());
    }

    #[test]
    fn test_multiple_regions_keep_order() {
        let xml = "<EventNotificationAlert><eventType>linedetection</eventType><DetectionRegionList>\
            <DetectionRegionEntry><regionID>3</regionID><detectionTarget>human</detectionTarget></DetectionRegionEntry>\
            <DetectionRegionEntry><regionID>1</regionID><detectionTarget>vehicle</detectionTarget></DetectionRegionEntry>\
            </DetectionRegionList></EventNotificationAlert>";
        let event = parse_payload(RawPayload::Text(xml.to_string())).unwrap();
        let ids: Vec<i64> = event.detection_regions.iter().map(|r| r.region_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
