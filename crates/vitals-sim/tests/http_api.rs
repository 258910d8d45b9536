use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use vitals_core::SimulatorConfig;
use vitals_core::delivery::testing::{Scripted, ScriptedTransport};
use vitals_sim::{SharedState, create_shared_state, router};

const RULES_URL: &str = "http://localhost:3000/api/vitals/stream";
const UI_URL: &str = "http://localhost:3001/api/vitals/update";

fn test_state(transport: Arc<ScriptedTransport>) -> SharedState {
    let mut config = SimulatorConfig::default();
    config.delivery.retry_delay_secs = 0;
    create_shared_state(config, transport).unwrap()
}

async fn call(
    state: &SharedState,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn get(state: &SharedState, uri: &str) -> (StatusCode, Value) {
    call(state, Method::GET, uri, None).await
}

async fn post(state: &SharedState, uri: &str, body: Value) -> (StatusCode, Value) {
    call(state, Method::POST, uri, Some(body)).await
}

async fn delete(state: &SharedState, uri: &str) -> (StatusCode, Value) {
    call(state, Method::DELETE, uri, None).await
}

#[tokio::test]
async fn test_health_and_ranges() {
    let state = test_state(Arc::new(ScriptedTransport::new()));

    let (status, body) = get(&state, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    let (status, body) = get(&state, "/api/vitals/ranges").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["emergency_critical_patient"]["heart_rate"],
        json!([30.0, 220.0])
    );
}

#[tokio::test]
async fn test_single_reading_is_delivered_and_becomes_current() {
    let transport = Arc::new(ScriptedTransport::new());
    let state = test_state(transport.clone());

    let (_, before) = get(&state, "/api/vitals/current").await;
    assert_eq!(before["data"]["status"], "no_data");

    let (status, single) = get(&state, "/api/vitals/single").await;
    assert_eq!(status, StatusCode::OK);
    let (_, current) = get(&state, "/api/vitals/current").await;
    assert_eq!(current["data"]["vital_signs"], single["data"]["vital_signs"]);

    assert_eq!(transport.requests_to(RULES_URL), 1);
    assert_eq!(transport.requests_to(UI_URL), 1);
}

#[tokio::test]
async fn test_validation_errors_map_to_400() {
    let state = test_state(Arc::new(ScriptedTransport::new()));

    let (status, body) =
        post(&state, "/api/simulator/interval", json!({"interval_seconds": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = post(&state, "/api/simulator/mode", json!({"mode": "panic"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&state, "/api/simulator/mode", json!({"wrong": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &state,
        "/api/vitals/custom-range",
        json!({"vital_type": "spo2", "min_value": 99, "max_value": 90}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Holds no one-decimal value
    let (status, _) = post(
        &state,
        "/api/vitals/custom-range",
        json!({"vital_type": "temperature", "min_value": 36.12, "max_value": 36.18}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&state, "/api/simulator/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["interval_seconds"], 10);
    assert_eq!(body["data"]["current_mode"], "normal");
}

#[tokio::test]
async fn test_mode_and_custom_range_flow() {
    let state = test_state(Arc::new(ScriptedTransport::new()));

    let (status, body) = post(&state, "/api/simulator/mode", json!({"mode": "abnormal"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current_mode"], "abnormal");

    let (status, _) = post(
        &state,
        "/api/vitals/custom-range",
        json!({"vital_type": "temperature", "min_value": 38.0, "max_value": 38.5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, single) = get(&state, "/api/vitals/single").await;
    let temperature = single["data"]["vital_signs"]["vitals"]["temperature"]
        .as_f64()
        .unwrap();
    assert!((38.0..=38.5).contains(&temperature));

    let (_, config) = get(&state, "/api/simulator/config").await;
    assert_eq!(
        config["data"]["simulation"]["custom_ranges"]["temperature"],
        json!([38.0, 38.5])
    );

    let (status, _) = delete(&state, "/api/vitals/custom-range/temperature").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = delete(&state, "/api/vitals/custom-range/temperature").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disabled_rule_engine_receives_nothing() {
    let transport = Arc::new(ScriptedTransport::new());
    let state = test_state(transport.clone());

    let (status, body) =
        post(&state, "/api/destinations/rule_engine", json!({"enabled": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    get(&state, "/api/vitals/single").await;
    assert_eq!(transport.requests_to(RULES_URL), 0);
    assert_eq!(transport.requests_to(UI_URL), 1);

    let (status, _) = post(&state, "/api/destinations/pager", json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connectivity_test_reports_each_destination() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script(UI_URL, [Scripted::Status(503)]);
    let state = test_state(transport);

    let (status, body) = call(&state, Method::POST, "/api/connectivity/test", None).await;
    assert_eq!(status, StatusCode::OK);
    let tests = &body["data"]["connectivity_tests"];
    assert_eq!(tests["rule_engine"]["success"], true);
    assert_eq!(tests["user_interface"]["success"], false);
    assert_eq!(tests["user_interface"]["status_code"], 503);
}

#[tokio::test]
async fn test_start_stop_and_metrics() {
    let state = test_state(Arc::new(ScriptedTransport::new()));

    let (_, started) = call(&state, Method::POST, "/api/simulator/start", None).await;
    assert_eq!(started["data"]["status"], "success");
    let (_, again) = call(&state, Method::POST, "/api/simulator/start", None).await;
    assert_eq!(again["data"]["status"], "already_running");

    let (status, metrics) = get(&state, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = metrics.as_str().unwrap();
    assert!(text.contains("vitals_simulation_running 1"));

    let (_, stopped) = call(&state, Method::POST, "/api/simulator/stop", None).await;
    assert_eq!(stopped["data"]["is_running"], false);
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() {
    let state = test_state(Arc::new(ScriptedTransport::new()));
    let (status, body) = get(&state, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "API endpoint not found");
}
