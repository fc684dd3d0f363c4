//! Executor tests against an in-process echo service

use axum::{
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::{any, get},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apiverify_common::{
    Configuration, Error, ExchangeObserver, ExpectationSet, RequestDescriptor, ResponseResult,
    TransportErrorKind,
};
use apiverify_engine::{Executor, RunVerdict, Scenario, ScenarioRunner};

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": body,
    }))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "too late"
}

async fn plain() -> (StatusCode, [(&'static str, &'static str); 1], &'static str) {
    (StatusCode::NOT_FOUND, [("x-reason", "missing")], "Order not found")
}

async fn spawn_echo() -> SocketAddr {
    let app = Router::new()
        .route("/api/v3/echo", any(echo))
        .route("/api/v3/echo/:id", any(echo))
        .route("/api/v3/slow", get(slow))
        .route("/api/v3/plain", get(plain));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn executor_for(addr: SocketAddr) -> Executor {
    let config = Configuration::builder(format!("http://{addr}/"))
        .base_path("/api/v3")
        .default_header("Content-Type", "application/json")
        .build()
        .unwrap();
    Executor::new(Arc::new(config)).unwrap()
}

fn echoed(result: &ResponseResult) -> &Value {
    result.parsed_body.as_ref().expect("echo returns JSON")
}

#[tokio::test]
async fn test_query_parameters_in_order() {
    let addr = spawn_echo().await;
    let executor = executor_for(addr);

    let descriptor = RequestDescriptor::get("/echo")
        .with_query("tags", vec!["tag2", "tag1"])
        .with_query("status", "");
    let result = executor.execute(&descriptor).await.unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(echoed(&result)["query"], "tags=tag2&tags=tag1&status=");
}

#[tokio::test]
async fn test_absent_query_sends_no_query_string() {
    let addr = spawn_echo().await;
    let result = executor_for(addr)
        .execute(&RequestDescriptor::get("/echo"))
        .await
        .unwrap();
    assert_eq!(echoed(&result)["query"], Value::Null);
}

#[tokio::test]
async fn test_path_params_and_method() {
    let addr = spawn_echo().await;
    let descriptor = RequestDescriptor::delete("/echo/{orderId}").with_path_param("orderId", "1");
    let result = executor_for(addr).execute(&descriptor).await.unwrap();

    assert_eq!(echoed(&result)["method"], "DELETE");
    assert_eq!(echoed(&result)["path"], "/api/v3/echo/1");
}

#[tokio::test]
async fn test_headers_merge_with_override() {
    let addr = spawn_echo().await;
    let descriptor = RequestDescriptor::post("/echo")
        .with_header("content-type", "text/plain")
        .with_header("X-Trace", "abc")
        .with_raw_body("hello");
    let result = executor_for(addr).execute(&descriptor).await.unwrap();

    let headers = &echoed(&result)["headers"];
    assert_eq!(headers["content-type"], "text/plain");
    assert_eq!(headers["x-trace"], "abc");
    assert_eq!(echoed(&result)["body"], "hello");
}

#[tokio::test]
async fn test_json_body_is_serialized() {
    let addr = spawn_echo().await;
    let pet = json!({"id": 1, "name": "Doggie", "photoUrls": ["www.testurl.com"]});
    let descriptor = RequestDescriptor::put("/echo").with_json_body(pet.clone());
    let result = executor_for(addr).execute(&descriptor).await.unwrap();

    assert_eq!(echoed(&result)["headers"]["content-type"], "application/json");
    let sent: Value = serde_json::from_str(echoed(&result)["body"].as_str().unwrap()).unwrap();
    assert_eq!(sent, pet);
}

#[tokio::test]
async fn test_non_json_response() {
    let addr = spawn_echo().await;
    let result = executor_for(addr)
        .execute(&RequestDescriptor::get("/plain"))
        .await
        .unwrap();

    assert_eq!(result.status_code, 404);
    assert_eq!(result.raw_body, "Order not found");
    assert_eq!(result.parsed_body, None);
    assert_eq!(result.headers["x-reason"], "missing");
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ExchangeObserver for RecordingObserver {
    fn on_request(&self, descriptor: &RequestDescriptor, url: &str) {
        self.events.lock().push(format!("request {} {}", descriptor.method(), url));
    }

    fn on_response(&self, _descriptor: &RequestDescriptor, result: &ResponseResult) {
        self.events.lock().push(format!("response {}", result.status_code));
    }

    fn on_transport_error(&self, _descriptor: &RequestDescriptor, error: &Error) {
        self.events
            .lock()
            .push(format!("error {}", error.transport_kind().map(|k| k.to_string()).unwrap_or_default()));
    }
}

#[tokio::test]
async fn test_observers_see_request_then_response() {
    let addr = spawn_echo().await;
    let observer = Arc::new(RecordingObserver::default());
    let config = Configuration::builder(format!("http://{addr}"))
        .base_path("api/v3")
        .observer(observer.clone())
        .build()
        .unwrap();
    let executor = Executor::new(Arc::new(config)).unwrap();

    executor
        .execute(&RequestDescriptor::get("/echo").with_query("a", "1"))
        .await
        .unwrap();

    assert_eq!(
        *observer.events.lock(),
        vec![
            format!("request GET http://{addr}/api/v3/echo?a=1"),
            "response 200".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_timeout_is_a_transport_error() {
    let addr = spawn_echo().await;
    let observer = Arc::new(RecordingObserver::default());
    let config = Configuration::builder(format!("http://{addr}/"))
        .base_path("/api/v3")
        .timeout(Duration::from_millis(200))
        .observer(observer.clone())
        .build()
        .unwrap();
    let executor = Executor::new(Arc::new(config)).unwrap();

    let err = executor
        .execute(&RequestDescriptor::get("/slow"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Timeout));
    assert_eq!(observer.events.lock().last().unwrap(), "error timeout");
}

#[tokio::test]
async fn test_connection_refused() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let executor = executor_for(addr);

    let err = executor
        .execute(&RequestDescriptor::get("/pet/1"))
        .await
        .unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::ConnectionRefused));

    let runner = ScenarioRunner::new(executor);
    let scenario = Scenario::fixed(
        "unreachable",
        RequestDescriptor::get("/pet/1"),
        ExpectationSet::status(200),
    )
    .unwrap();
    let report = runner.run(&scenario).await.unwrap();
    assert!(!report.passed());
    assert!(matches!(
        report.runs[0].verdict,
        RunVerdict::TransportFailed {
            kind: TransportErrorKind::ConnectionRefused,
            ..
        }
    ));
}
