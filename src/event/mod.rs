//! 摄像头事件 - 载荷提取、XML 读取与规范化

pub mod extract;
pub mod normalizer;
pub mod types;
pub mod xml;

pub use extract::{
    BodyFieldStrategy, ExtractionStrategy, FilePart, InboundRequest, MultipartFileStrategy,
    RawPayload, XmlFragmentStrategy,
};
pub use normalizer::{parse_captured, parse_payload, PayloadNormalizer, DEFAULT_FIELD};
pub use types::{CameraEvent, Coordinate, DetectionRegion, TargetRect, ROOT_ELEMENT};
