//! 载荷提取策略
//!
//! 摄像头固件推送事件的方式并不统一：可能作为请求体字段、multipart 文件，
//! 或直接把 XML 片段塞在请求体里。每种方式实现为一个 `ExtractionStrategy`，
//! 由 `PayloadNormalizer` 按顺序尝试，取第一个非空结果。

use regex::Regex;
use serde_json::{Map, Value};

/// 入站请求的中立表示（与 HTTP 框架无关）
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    /// 结构化请求体字段（JSON 对象、表单字段、multipart 文本字段）
    pub fields: Map<String, Value>,
    /// multipart 文件部分
    pub files: Vec<FilePart>,
    /// 原始请求体文本（结构化请求体为其 JSON 序列化）
    pub raw_text: Option<String>,
}

impl InboundRequest {
    /// 仅有原始文本的请求（如 `text/xml`）
    pub fn from_raw_text(text: impl Into<String>) -> Self {
        Self {
            raw_text: Some(text.into()),
            ..Default::default()
        }
    }

    /// 结构化请求体；原始文本取其序列化结果
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let raw_text = Value::Object(fields.clone()).to_string();
        Self {
            fields,
            files: Vec::new(),
            raw_text: Some(raw_text),
        }
    }

    pub fn with_file(mut self, file: FilePart) -> Self {
        self.files.push(file);
        self
    }

    /// 用于日志的字段名列表
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}

/// multipart 文件部分
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(field_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: None,
            content_type: None,
            data: data.into(),
        }
    }
}

/// 提取出的原始载荷，尚未解析
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// 文本（通常是 XML）
    Text(String),
    /// 未解码的字节（multipart 文件）
    Bytes(Vec<u8>),
    /// 已是结构化数据
    Json(Value),
}

/// 提取策略
pub trait ExtractionStrategy: Send + Sync {
    /// 策略名称（用于日志）
    fn name(&self) -> &str;

    /// 尝试提取；没有数据时返回 `None`
    fn extract(&self, request: &InboundRequest) -> Option<RawPayload>;
}

/// 从请求体字段提取
pub struct BodyFieldStrategy {
    field: String,
}

impl BodyFieldStrategy {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl ExtractionStrategy for BodyFieldStrategy {
    fn name(&self) -> &str {
        "body_field"
    }

    fn extract(&self, request: &InboundRequest) -> Option<RawPayload> {
        match request.fields.get(&self.field)? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(RawPayload::Text(s.clone())),
            // 其他类型交给解析阶段判断格式
            other => Some(RawPayload::Json(other.clone())),
        }
    }
}

/// 从 multipart 文件部分提取
pub struct MultipartFileStrategy {
    field: String,
}

impl MultipartFileStrategy {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl ExtractionStrategy for MultipartFileStrategy {
    fn name(&self) -> &str {
        "multipart_file"
    }

    fn extract(&self, request: &InboundRequest) -> Option<RawPayload> {
        request
            .files
            .iter()
            .find(|f| f.field_name == self.field && !f.data.is_empty())
            .map(|f| RawPayload::Bytes(f.data.clone()))
    }
}

/// 在原始请求体文本中搜索 XML 片段
pub struct XmlFragmentStrategy {
    pattern: Regex,
}

impl XmlFragmentStrategy {
    /// 匹配 `<tag ...>...</tag>`，非贪婪，可跨行
    pub fn new(tag: &str) -> Result<Self, regex::Error> {
        let tag = regex::escape(tag);
        let pattern = Regex::new(&format!(r"<{tag}[\s\S]*?</{tag}>"))?;
        Ok(Self { pattern })
    }
}

impl ExtractionStrategy for XmlFragmentStrategy {
    fn name(&self) -> &str {
        "xml_fragment"
    }

    fn extract(&self, request: &InboundRequest) -> Option<RawPayload> {
        let text = request.raw_text.as_deref()?;
        self.pattern
            .find(text)
            .map(|m| RawPayload::Text(m.as_str().to_string()))
    }
}
