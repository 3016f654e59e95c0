//! Tests for fnexec-gateway: routes, payload shapes, status codes

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use fnexec_core::*;
use fnexec_gateway::build_router;
use fnexec_runtime::FunctionRuntime;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// ===========================================================================
// Fixtures
// ===========================================================================

struct Fixture {
    tmp: TempDir,
    runtime: Arc<FunctionRuntime>,
}

/// Write `<remote>/<function>.tar` holding a `function.sh` entry point.
fn publish(remote: &Path, function: &str, script: &str) {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, format!("{}/function.sh", function), script.as_bytes())
        .unwrap();
    std::fs::write(
        remote.join(format!("{}.tar", function)),
        builder.into_inner().unwrap(),
    )
    .unwrap();
}

async fn fixture(prefix: &str) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let remote = tmp.path().join("remote");
    std::fs::create_dir_all(&remote).unwrap();
    publish(&remote, "echo-test", "echo \"hello $OPENOBD_SESSION_INFO\"\n");

    let mut config = RuntimeConfig::default();
    config.run_directory = tmp.path().join("run");
    config.functions_location = remote.display().to_string();
    config.logs_location = tmp.path().join("logs").display().to_string();
    config.executor.route_prefix = prefix.to_string();
    config.executor.interpreter = "sh".into();
    config.executor.entry_point = "function.sh".into();
    config.executor.echo_output = false;

    let runtime = Arc::new(FunctionRuntime::new(config));
    runtime.start().await.unwrap();
    Fixture { tmp, runtime }
}

fn app(fx: &Fixture) -> Router {
    build_router(fx.runtime.clone())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

// ===========================================================================
// Read-only routes
// ===========================================================================

#[tokio::test]
async fn health_is_served_at_root_and_prefix() {
    let fx = fixture("python").await;
    for uri in ["/", "/python"] {
        let (status, body) = get_json(app(&fx), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "healthy": true }));
    }
}

#[tokio::test]
async fn functions_lists_active_slot() {
    let fx = fixture("python").await;
    let (status, body) = get_json(app(&fx), "/python/functions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["echo-test"]));
}

#[tokio::test]
async fn running_functions_starts_empty() {
    let fx = fixture("python").await;
    let (status, body) = get_json(app(&fx), "/python/running_functions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn custom_prefix_moves_routes() {
    let fx = fixture("/node/").await;
    let (status, body) = get_json(app(&fx), "/node/functions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["echo-test"]));

    let resp = app(&fx)
        .oneshot(Request::builder().uri("/python/functions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ===========================================================================
// Reload
// ===========================================================================

#[tokio::test]
async fn reload_picks_up_new_functions() {
    let fx = fixture("python").await;
    publish(&fx.tmp.path().join("remote"), "another", "exit 0\n");

    let (status, body) = get_json(app(&fx), "/python/reload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["another", "echo-test"]));

    let (_, listed) = get_json(app(&fx), "/python/functions").await;
    assert_eq!(listed, body);
}

#[tokio::test]
async fn reload_failure_is_a_server_error() {
    let fx = fixture("python").await;
    std::fs::remove_dir_all(fx.tmp.path().join("remote")).unwrap();

    let (status, body) = get_json(app(&fx), "/python/reload").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("remote"));

    // previous listing still served
    let (_, listed) = get_json(app(&fx), "/python/functions").await;
    assert_eq!(listed, serde_json::json!(["echo-test"]));
}

// ===========================================================================
// Invocation
// ===========================================================================

#[tokio::test]
async fn invoke_unknown_function_is_404() {
    let fx = fixture("python").await;
    let (status, body) = post_json(
        app(&fx),
        "/python/function/missing",
        serde_json::json!({ "session_info": "abc" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "detail": "Function missing not found" }));
    assert!(fx.runtime.list_running_executions().is_empty());
}

#[tokio::test]
async fn invoke_accepts_and_echoes_request() {
    let fx = fixture("python").await;
    let (status, body) = post_json(
        app(&fx),
        "/python/function/echo-test",
        serde_json::json!({ "session_info": "abc", "ignored": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["function_id"], "echo-test");
    assert_eq!(body["request"], serde_json::json!({ "session_info": "abc" }));
    let runtime_id: RuntimeId = body["runtime_id"].as_str().unwrap().parse().unwrap();

    for _ in 0..500 {
        if !fx.runtime.list_running_executions().contains(&runtime_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (_, running) = get_json(app(&fx), "/python/running_functions").await;
    assert!(!running
        .as_array()
        .unwrap()
        .iter()
        .any(|id| id.as_str() == Some(&runtime_id.to_string())));

    let log = fx
        .runtime
        .config()
        .executions_dir()
        .join(format!("{}_echo-test", runtime_id))
        .join("output.log");
    assert!(std::fs::read_to_string(log).unwrap().contains("hello abc"));
}

#[tokio::test]
async fn invoke_without_session_info_is_rejected() {
    let fx = fixture("python").await;
    let (status, _) = post_json(
        app(&fx),
        "/python/function/echo-test",
        serde_json::json!({ "session": "abc" }),
    )
    .await;

    assert!(status.is_client_error());
    assert!(fx.runtime.list_running_executions().is_empty());
}
