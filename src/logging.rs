//! 日志初始化
//!
//! - 终端：stderr，人类可读格式
//! - 文件：JSON 行，按大小轮转（默认 `./logs/app.log`，5 MB，保留 5 个文件）
//!
//! 级别来源：`RUST_LOG` > `LOG_LEVEL` > 默认 info。

use anyhow::{Context, Result};
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILE: &str = "./logs/app.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// 单个日志文件上限
pub const MAX_LOG_FILE_BYTES: u64 = 5 * 1024 * 1024;
/// 日志文件总数（当前文件 + 轮转文件）
pub const MAX_LOG_FILES: usize = 5;

/// 关闭文件日志的取值
const DISABLED: &[&str] = &["-", "off", "none"];

/// 日志设置
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// EnvFilter 指令
    pub filter: String,
    /// 日志文件；`None` 表示只写终端
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// 从环境变量读取
    ///
    /// `with_file` 为 false 时（离线命令）忽略 `LOG_FILE`。
    pub fn from_env<E>(env: E, with_file: bool) -> Self
    where
        E: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let filter = match (env("RUST_LOG"), env("LOG_LEVEL")) {
            (Some(directive), _) => directive,
            (None, Some(level)) => level_directive(&level),
            (None, None) => level_directive(DEFAULT_LOG_LEVEL),
        };

        let file = if with_file {
            match env("LOG_FILE") {
                Some(v) if DISABLED.contains(&v.to_lowercase().as_str()) => None,
                Some(v) => Some(PathBuf::from(v)),
                None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
            }
        } else {
            None
        };

        Self { filter, file }
    }
}

/// `LOG_LEVEL=debug` → 本 crate 与请求日志都取该级别
fn level_directive(level: &str) -> String {
    let level = level.to_lowercase();
    format!("camera_gate={},tower_http={}", level, level)
}

/// 打开按大小轮转的日志文件，目录不存在时创建
pub fn open_log_file(path: &Path, max_bytes: u64, max_files: usize) -> Result<BasicRollingFileAppender> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }

    // 第三个参数是轮转文件数，不含当前文件
    BasicRollingFileAppender::new(
        path,
        RollingConditionBasic::new().max_size(max_bytes),
        max_files.saturating_sub(1),
    )
    .with_context(|| format!("failed to open log file {}", path.display()))
}

/// 安装全局 subscriber
///
/// 返回的 guard 必须存活到进程结束，否则文件日志可能丢失尾部。
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let (filter, bad_filter) = match EnvFilter::try_new(&settings.filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(level_directive(DEFAULT_LOG_LEVEL)), Some(e)),
    };

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let appender = open_log_file(path, MAX_LOG_FILE_BYTES, MAX_LOG_FILES)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = bad_filter {
        tracing::warn!(filter = %settings.filter, error = %e, "Invalid log filter, falling back to info");
    }
    if let Some(path) = &settings.file {
        tracing::debug!(path = %path.display(), "File logging enabled");
    }

    Ok(guard)
}
