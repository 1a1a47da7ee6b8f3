//! 日志安全输出 - 过滤二进制数据并截断超长文本

/// 单条日志字段的最大字符数
pub const MAX_PREVIEW_CHARS: usize = 1000;

/// 可打印字符占比低于该值时视为二进制数据
const PRINTABLE_RATIO: f64 = 0.7;

/// 生成适合写入日志的预览文本
///
/// 摄像头可能把图片等二进制内容混在请求体中，直接写日志会污染输出。
pub fn safe_preview(text: &str) -> String {
    let total = text.chars().count();
    if total == 0 {
        return String::new();
    }

    let printable = text.chars().filter(|c| (' '..='~').contains(c)).count();
    if (printable as f64) / (total as f64) < PRINTABLE_RATIO {
        return format!("[Binary data, length: {}]", text.len());
    }

    if total > MAX_PREVIEW_CHARS {
        let truncated: String = text.chars().take(MAX_PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

/// 字节内容的预览（非 UTF-8 部分按替换字符处理）
pub fn safe_preview_bytes(bytes: &[u8]) -> String {
    safe_preview(&String::from_utf8_lossy(bytes))
}
