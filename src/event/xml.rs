//! 受限 XML 方言读取
//!
//! 摄像头推送的 XML 只用到元素和文本，这里把它转换成 `serde_json::Value`：
//! - 元素默认是标量，同名兄弟元素出现多次才变成数组（不强制包数组）
//! - 属性和命名空间前缀忽略，只保留本地名
//! - 文本按需转换：整数/小数变成数字，恰好为 `true`/`false` 变成布尔值
//! - 空元素变成空字符串

use crate::error::ParseError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

/// 元素最大嵌套层数（摄像头告警实际不超过 6 层）
pub const MAX_DEPTH: usize = 32;

/// 正在构建的元素
struct Frame {
    name: String,
    children: Vec<(String, Value)>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> Value {
        if self.children.is_empty() {
            return coerce_scalar(self.text.trim());
        }

        // 混合内容中的文本忽略
        let mut map = Map::new();
        for (name, value) in self.children {
            match map.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(name, value);
                }
            }
        }
        Value::Object(map)
    }
}

/// 解析 XML 文本，返回 `(根元素名, 根元素内容)`
pub fn parse_document(text: &str) -> Result<(String, Value), ParseError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::InvalidXml(e.to_string()))?;

        match event {
            Event::Start(e) => {
                if stack.is_empty() && root.is_some() {
                    return Err(ParseError::InvalidXml("multiple root elements".to_string()));
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(ParseError::InvalidXml("nesting too deep".to_string()));
                }
                stack.push(Frame::new(local_name(e.local_name().as_ref())?));
            }
            Event::Empty(e) => {
                let name = local_name(e.local_name().as_ref())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push((name, Value::String(String::new()))),
                    None if root.is_none() => root = Some((name, Value::String(String::new()))),
                    None => return Err(ParseError::InvalidXml("multiple root elements".to_string())),
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| ParseError::InvalidXml(e.to_string()))?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None => {
                        return Err(ParseError::InvalidXml(
                            "text outside of the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| ParseError::InvalidXml(e.to_string()))?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(text);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| ParseError::InvalidXml("unexpected closing tag".to_string()))?;
                let name = frame.name.clone();
                let value = frame.into_value();
                match stack.last_mut() {
                    Some(parent) => parent.children.push((name, value)),
                    None => root = Some((name, value)),
                }
            }
            Event::Eof => break,
            // 声明、注释、处理指令、DOCTYPE
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::InvalidXml("unexpected end of document".to_string()));
    }

    root.ok_or_else(|| ParseError::InvalidXml("document has no root element".to_string()))
}

fn local_name(raw: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| ParseError::InvalidXml(e.to_string()))
}

/// 文本的按需类型转换
pub fn coerce_scalar(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if !looks_numeric(text) {
        return Value::String(text.to_string());
    }

    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(i.into());
    }

    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

/// 排除 "inf"、"NaN" 等 Rust 能解析但摄像头不会发送的写法
fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}
