//! HTTP 接入层
//!
//! 提供以下端点：
//! - POST /api/camera/data - 接收摄像头事件
//! - GET /api/camera/status - 接入状态
//! - GET /api/health - 健康检查
//!
//! 只负责把请求转换成 `InboundRequest`、把结果映射成状态码；
//! 通知在后台任务中发送，摄像头的响应不等待出站调用。

use crate::error::ParseError;
use crate::event::{FilePart, InboundRequest, DEFAULT_FIELD};
use crate::pipeline::EventPipeline;
use crate::preview::safe_preview;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::body::Bytes;
use axum::{Form, Json, Router};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<EventPipeline>,
    started_at: Instant,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<EventPipeline>, max_body_bytes: usize) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
            max_body_bytes,
        }
    }

    pub fn pipeline(&self) -> &Arc<EventPipeline> {
        &self.pipeline
    }
}

/// 接入层错误
#[derive(Debug)]
pub enum ApiError {
    /// 载荷缺失或解析失败
    Parse(ParseError),
    /// multipart 请求体无法解析
    Multipart(String),
    /// 请求体无法读取
    Body(String),
    /// 请求体超过大小限制
    PayloadTooLarge,
    /// 未预期的内部错误
    Internal(String),
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        ApiError::Parse(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Parse(ParseError::NoData) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": ParseError::NoData.to_string() }),
            ),
            ApiError::Parse(_) => (StatusCode::BAD_REQUEST, json!({ "error": "Invalid XML format" })),
            ApiError::Multipart(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Failed to process multipart data" }),
            ),
            ApiError::Body(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Failed to read request body" }),
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": "Payload too large" }),
            ),
            ApiError::Internal(message) => {
                error!(error = %message, "Internal error while processing camera data");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "message": message }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/api/camera/data", post(receive_camera_data))
        .route("/api/camera/status", get(camera_status))
        .route("/api/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// 启动服务，直到进程退出
pub async fn serve(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Camera API server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn receive_camera_data(State(state): State<AppState>, request: Request) -> Response {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let inbound = match read_inbound(&content_type, request).await {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!(content_type = %content_type, error = ?e, "Failed to read camera request");
            return e.into_response();
        }
    };

    info!(
        content_type = %content_type,
        body_keys = ?inbound.field_names(),
        file_parts = inbound.files.len(),
        has_linedetection = inbound.fields.contains_key(DEFAULT_FIELD),
        body = %safe_preview(inbound.raw_text.as_deref().unwrap_or("")),
        "Received camera data"
    );

    let evaluation = match state.pipeline.ingest(&inbound) {
        Ok(evaluation) => evaluation,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let body = json!({
        "success": true,
        "message": "Camera data processed successfully",
        "data": {
            "receivedAt": Utc::now().to_rfc3339(),
            "eventType": evaluation.event.event_type,
            "eventState": evaluation.event.event_state,
        }
    });

    if evaluation.result.is_match() {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            pipeline.dispatch(&evaluation).await;
        });
    }

    (StatusCode::OK, Json(body)).into_response()
}

/// 按 Content-Type 转换请求体
///
/// 大小限制由路由上的 `DefaultBodyLimit` 决定。
async fn read_inbound(content_type: &str, request: Request) -> Result<InboundRequest, ApiError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "multipart/form-data" => read_multipart(request).await,
        "application/x-www-form-urlencoded" => {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            let fields: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Ok(InboundRequest::from_fields(fields))
        }
        _ => {
            let bytes = Bytes::from_request(request, &())
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;

            if mime == "application/json" || mime.ends_with("+json") {
                if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(&bytes) {
                    return Ok(InboundRequest::from_fields(fields));
                }
            }
            Ok(InboundRequest::from_raw_text(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }
}

/// 文本字段进入 `fields`，带文件名的部分进入 `files`
async fn read_multipart(request: Request) -> Result<InboundRequest, ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?;

    let mut fields = Map::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if file_name.is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e.status(), e.body_text()))?;
            files.push(FilePart {
                field_name: name,
                file_name,
                content_type,
                data: data.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| multipart_error(e.status(), e.body_text()))?;
            fields.insert(name, Value::String(text));
        }
    }

    let mut inbound = InboundRequest::from_fields(fields);
    inbound.files = files;
    Ok(inbound)
}

fn body_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Body(message)
    }
}

fn multipart_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Multipart(message)
    }
}

async fn camera_status() -> Json<Value> {
    Json(json!({
        "status": "available",
        "timestamp": Utc::now().to_rfc3339(),
        "message": "Camera API is ready to receive data",
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" }))).into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown error".to_string()
    };
    ApiError::Internal(message).into_response()
}
