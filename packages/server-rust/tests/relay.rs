//! Events published through the sidecar reach the local application over
//! HTTP via the consumption loop.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use common::{http_json, start};
use reqwest::Method as HttpMethod;
use serde_json::json;
use sidecar_core::{Event, TraceContext, TRACEPARENT};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct App {
    deliveries: mpsc::UnboundedSender<(Event, Option<String>)>,
    calls: AtomicUsize,
    fail_first: bool,
}

async fn receive(State(app): State<Arc<App>>, headers: HeaderMap, Json(event): Json<Event>) -> StatusCode {
    let call = app.calls.fetch_add(1, Ordering::SeqCst);
    if app.fail_first && call == 0 {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let traceparent = headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let _ = app.deliveries.send((event, traceparent));
    StatusCode::OK
}

async fn start_app(fail_first: bool) -> (u16, mpsc::UnboundedReceiver<(Event, Option<String>)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Arc::new(App {
        deliveries: tx,
        calls: AtomicUsize::new(0),
        fail_first,
    });
    let router = Router::new().route("/orders", post(receive)).with_state(app);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, router).await });
    (port, rx)
}

async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<(Event, Option<String>)>) -> (Event, Option<String>) {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivery within five seconds")
        .expect("app still running")
}

#[tokio::test]
async fn published_event_is_relayed_with_the_callers_trace() {
    let (port, mut deliveries) = start_app(false).await;
    let port = port.to_string();
    let sidecar = start(&[
        "--broker",
        "memory",
        "--producers",
        "orders",
        "--consumers",
        "orders",
        "--service-port",
        &port,
    ])
    .await;

    let caller = TraceContext::new_root();
    let response = reqwest::Client::new()
        .post(format!("http://{}/publish", sidecar.addresses().http))
        .header(TRACEPARENT, caller.to_traceparent())
        .json(&json!({ "eventName": "orders", "payload": { "id": 42 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (event, traceparent) = next_delivery(&mut deliveries).await;
    assert_eq!(event.event_name, "orders");
    assert_eq!(event.payload, br#"{"id":42}"#.to_vec());
    assert!(event.created_at > 0);

    let relayed = TraceContext::from_traceparent(&traceparent.expect("traceparent header")).unwrap();
    assert_eq!(relayed.trace_id, caller.trace_id);

    sidecar.stop().await;
}

#[tokio::test]
async fn a_rejected_delivery_does_not_stop_the_loop() {
    let (port, mut deliveries) = start_app(true).await;
    let port = port.to_string();
    let sidecar = start(&[
        "--broker",
        "memory",
        "--producers",
        "orders",
        "--consumers",
        "orders",
        "--service-port",
        &port,
    ])
    .await;
    let http = sidecar.addresses().http;

    for n in 1..=2 {
        let (status, _) = http_json(
            HttpMethod::POST,
            http,
            "/publish",
            Some(json!({ "eventName": "orders", "payload": n })),
        )
        .await;
        assert_eq!(status, 200);
    }

    let (event, _) = next_delivery(&mut deliveries).await;
    assert_eq!(event.payload, b"2".to_vec());

    sidecar.stop().await;
}

#[tokio::test]
async fn publishing_to_an_unknown_topic_is_not_found() {
    let sidecar = start(&["--broker", "memory", "--producers", "orders"]).await;
    let (status, body) = http_json(
        HttpMethod::POST,
        sidecar.addresses().http,
        "/publish",
        Some(json!({ "eventName": "payments", "payload": {} })),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], 404);
    sidecar.stop().await;
}
