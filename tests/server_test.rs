mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use camera_gate::notification::ManualClock;
use camera_gate::{router, AppState};
use common::{pipeline_with, RecordingNotifier, HUMAN_XML, VEHICLE_XML};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

const LIMIT: usize = 1024 * 1024;

fn app(targets: &str) -> (Router, Arc<RecordingNotifier>, UnboundedReceiver<String>) {
    let (notifier, rx) = RecordingNotifier::new();
    let pipeline = pipeline_with(
        notifier.clone(),
        targets,
        Duration::from_millis(60_000),
        Arc::new(ManualClock::new()),
    );
    let state = AppState::new(Arc::new(pipeline), LIMIT);
    (router(state), notifier, rx)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), LIMIT).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/camera/data")
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

fn json_body(xml: &str) -> String {
    json!({ "linedetection": xml }).to_string()
}

/// 后台通知在限定时间内到达
async fn expect_call(rx: &mut UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification not dispatched")
        .expect("channel closed")
}

#[tokio::test]
async fn test_json_vehicle_event_accepted_and_notified() {
    let (app, notifier, mut rx) = app("vehicle");

    let (status, body) = send(app, post("application/json", json_body(VEHICLE_XML))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Camera data processed successfully");
    assert_eq!(body["data"]["eventType"], "linedetection");
    assert!(body["data"]["receivedAt"].is_string());

    assert_eq!(expect_call(&mut rx).await, "linedetection");
    assert_eq!(notifier.calls().len(), 1);
}

#[tokio::test]
async fn test_other_target_accepted_without_notification() {
    let (app, notifier, mut rx) = app("vehicle");

    let (status, _) = send(app, post("application/json", json_body(HUMAN_XML))).await;

    assert_eq!(status, StatusCode::OK);
    let waited = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(waited.is_err());
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn test_missing_payload_returns_400() {
    let (app, _, _rx) = app("vehicle");

    let (status, body) = send(app, post("application/json", json!({ "other": 1 }).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No linedetection data provided" }));
}

#[tokio::test]
async fn test_malformed_xml_returns_400() {
    let (app, notifier, _rx) = app("vehicle");

    let broken = "<EventNotificationAlert><eventType>linedetection</eventType>";
    let (status, body) = send(app, post("application/json", json_body(broken))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid XML format");
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn test_raw_xml_body() {
    let (app, _, mut rx) = app("vehicle");

    let (status, body) = send(app, post("application/xml", VEHICLE_XML)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["eventType"], "linedetection");
    expect_call(&mut rx).await;
}

#[tokio::test]
async fn test_multipart_file_part() {
    let (app, _, mut rx) = app("vehicle");

    let boundary = "XBOUNDARYX";
    let multipart = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"linedetection\"; filename=\"linedetection.xml\"\r\n\
         Content-Type: application/xml\r\n\r\n\
         {xml}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"picture\"; filename=\"snap.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n\
         JPEGDATA\r\n\
         --{b}--\r\n",
        b = boundary,
        xml = VEHICLE_XML
    );
    let content_type = format!("multipart/form-data; boundary={}", boundary);

    let (status, body) = send(app, post(&content_type, multipart)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    expect_call(&mut rx).await;
}

#[tokio::test]
async fn test_urlencoded_field() {
    let (app, _, mut rx) = app("vehicle");

    let form = format!("linedetection={}", urlencode(VEHICLE_XML));
    let (status, _) = send(app, post("application/x-www-form-urlencoded", form)).await;

    assert_eq!(status, StatusCode::OK);
    expect_call(&mut rx).await;
}

#[tokio::test]
async fn test_malformed_multipart_returns_400() {
    let (app, _, _rx) = app("vehicle");

    let broken = "--XB\r\nContent-Disposition: form-data; name=\"linedetection\"\r\n\r\nunterminated";
    let (status, body) = send(app, post("multipart/form-data; boundary=XB", broken)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to process multipart data");
}

#[tokio::test]
async fn test_numeric_field_is_rejected() {
    let (app, _, _rx) = app("vehicle");

    let (status, body) = send(app, post("application/json", json!({ "linedetection": 5 }).to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid XML format");
}

#[tokio::test]
async fn test_oversized_body_returns_413() {
    let (app, notifier, _rx) = app("vehicle");

    let body = format!("{}{}", VEHICLE_XML, " ".repeat(LIMIT + 1));
    let (status, body) = send(app, post("application/xml", body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Payload too large");
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn test_deeply_nested_xml_returns_400() {
    let (app, notifier, _rx) = app("vehicle");

    let depth = 100_000;
    let body = format!(
        "<EventNotificationAlert><eventType>linedetection</eventType>{}{}</EventNotificationAlert>",
        "<a>".repeat(depth),
        "</a>".repeat(depth)
    );
    let (status, body) = send(app, post("application/xml", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid XML format");
    assert!(notifier.calls().is_empty());
}

#[tokio::test]
async fn test_status_and_health() {
    let (app, _, _rx) = app("vehicle");

    let request = Request::builder().uri("/api/camera/status").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "available");

    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _, _rx) = app("vehicle");

    let request = Request::builder().uri("/api/nope").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

fn urlencode(input: &str) -> String {
    input
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}
