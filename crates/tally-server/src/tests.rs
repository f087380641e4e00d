//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tally_core::test_utils::{MockClassifierServer, MockServerMode, WebhookSink};
use tally_core::{
    Category, ClassifierClient, Database, DefaultTransport, MemoryStore, MockClassifier, PatternRuleMatcher,
    TallyConfig,
};
use tower::ServiceExt;

fn setup_engine(mock: Option<MockClassifier>) -> Arc<Engine> {
    setup_engine_with(TallyConfig::default(), mock.map(ClassifierClient::Mock))
}

fn setup_engine_with(config: TallyConfig, classifier: Option<ClassifierClient>) -> Arc<Engine> {
    let transport = Arc::new(DefaultTransport::new(&config.notifications).unwrap());
    Arc::new(Engine::with_parts(
        config,
        Database::in_memory().unwrap(),
        Arc::new(MemoryStore::new()),
        PatternRuleMatcher::embedded().unwrap(),
        classifier,
        transport,
    ))
}

fn setup_test_app() -> Router {
    create_router(setup_engine(Some(MockClassifier::new())), ServerConfig::default())
}

async fn get_body_json(response: axum::response::Response) -> Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> axum::response::Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

// ========== Classification ==========

#[tokio::test]
async fn test_classify_single() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({
            "id": "tx-1",
            "description": "STARBUCKS STORE 1234",
            "amount": 6.45,
            "date": "2024-03-01"
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["transaction_id"], "tx-1");
    assert_eq!(json["category"], "Dining Out");
    assert_eq!(json["source"], "rule");
}

#[tokio::test]
async fn test_classify_rejected_input_is_still_a_result() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-1", "description": "X", "amount": 1.0, "date": "soon" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("Preprocessing failed"));
}

#[tokio::test]
async fn test_classify_batch() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/classify/batch",
        Some(json!({ "transactions": [
            { "id": "a", "description": "LOBLAWS 1021", "amount": 55.0, "date": "2024-03-01" },
            { "id": "b", "description": "", "amount": 5.0, "date": "2024-03-01" },
            { "id": "c", "description": "PIZZA NOVA", "amount": 22.0, "date": "2024-03-01" }
        ]})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 3);
    assert_eq!(json["degraded"], 1);
    assert_eq!(json["results"][0]["category"], "Groceries");
    assert_eq!(json["results"][2]["transaction_id"], "c");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_classify_batch_isolates_malformed_items() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/classify/batch",
        Some(json!({ "transactions": [
            { "id": "a", "description": "LOBLAWS 1021", "amount": 55.0, "date": "2024-03-01" },
            { "id": "b", "description": "PIZZA NOVA", "amount": "twelve", "date": "2024-03-01" },
            { "description": "PIZZA NOVA", "amount": 22.0, "date": "2024-03-01" },
            { "id": "d", "description": "LOBLAWS 1021", "amount": "18.25", "date": "2024-03-01" }
        ]})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 4);
    assert_eq!(json["degraded"], 2);
    assert_eq!(json["results"][0]["category"], "Groceries");
    assert_eq!(json["results"][1]["transaction_id"], "b");
    assert!(json["results"][1]["error"].as_str().unwrap().contains("amount"));
    assert!(json["results"][2]["error"]
        .as_str()
        .unwrap()
        .contains("missing transaction id"));
    assert_eq!(json["results"][3]["category"], "Groceries");
}

#[tokio::test]
async fn test_classify_single_with_string_amount() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-1", "description": "LOBLAWS 1021", "amount": "twelve", "date": "2024-03-01" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("amount is not a number"));
}

#[tokio::test]
async fn test_classify_batch_too_large() {
    let app = setup_test_app();
    let transactions: Vec<Value> = (0..101)
        .map(|i| json!({ "id": i.to_string(), "description": "UBER", "amount": 9.0, "date": "2024-03-01" }))
        .collect();
    let response = send(
        &app,
        "POST",
        "/api/classify/batch",
        Some(json!({ "transactions": transactions })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("maximum of 100"));
}

#[tokio::test]
async fn test_rules_dry_run() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/rules/test",
        Some(json!({ "description": "NETFLIX.COM", "amount": 16.99 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["matched"]["category"], "Entertainment");
    assert_eq!(json["short_circuits"], true);
}

// ========== Feedback ==========

#[tokio::test]
async fn test_feedback_flow() {
    let app = setup_test_app();
    send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-9", "description": "GREEN BASKET CO-OP", "amount": 40.0, "date": "2024-03-01" })),
    )
    .await;

    let response = send(
        &app,
        "POST",
        "/api/feedback",
        Some(json!({
            "transaction_id": "tx-9",
            "original_category": "Other",
            "corrected_category": "Groceries"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Groceries");
    assert_eq!(json["cache_updated"], true);

    let again = send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-10", "description": "GREEN BASKET CO-OP", "amount": 12.0, "date": "2024-03-02" })),
    )
    .await;
    let json = get_body_json(again).await;
    assert_eq!(json["category"], "Groceries");
    assert_eq!(json["source"], "cache");
}

#[tokio::test]
async fn test_feedback_unknown_transaction() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/feedback",
        Some(json!({ "transaction_id": "ghost", "corrected_category": "Groceries" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feedback_bulk_reports_failures() {
    let app = setup_test_app();
    send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-1", "description": "SOME SHOP", "amount": 40.0, "date": "2024-03-01" })),
    )
    .await;

    let response = send(
        &app,
        "POST",
        "/api/feedback/bulk",
        Some(json!({ "records": [
            { "transaction_id": "tx-1", "corrected_category": "Shopping" },
            { "transaction_id": "ghost", "corrected_category": "Shopping" }
        ]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["processed"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["failures"][0]["transaction_id"], "ghost");
}

// ========== Alerts & monitoring ==========

#[tokio::test]
async fn test_monitor_check_and_resolve() {
    let app = create_router(
        setup_engine(Some(MockClassifier::unavailable())),
        ServerConfig::default(),
    );
    for i in 0..5 {
        send(
            &app,
            "POST",
            "/api/classify",
            Some(json!({ "id": format!("f-{}", i), "description": "UNHEARD OF VENDOR", "amount": 12.0, "date": "2024-03-01" })),
        )
        .await;
    }

    let response = send(&app, "POST", "/api/monitor/check", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let opened = json["opened"].as_array().unwrap();
    assert!(opened.iter().any(|a| a["type"] == "error_rate"));

    let active = get_body_json(send(&app, "GET", "/api/alerts", None).await).await;
    let id = active[0]["id"].as_str().unwrap().to_string();

    let response = send(&app, "POST", &format!("/api/alerts/{}/resolve", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["resolved"], true);

    let history = get_body_json(send(&app, "GET", "/api/alerts/history", None).await).await;
    assert!(history.as_array().unwrap().iter().any(|a| a["id"] == id.as_str()));
}

#[tokio::test]
async fn test_classify_through_ollama_backend() {
    let server = MockClassifierServer::start_with(MockServerMode::Fixed(Category::Shopping)).await;
    let app = create_router(
        setup_engine_with(
            TallyConfig::default(),
            Some(ClassifierClient::ollama(&server.url(), "llama3.2")),
        ),
        ServerConfig::default(),
    );

    let body = json!({ "id": "o-1", "description": "UNHEARD OF VENDOR", "amount": 16.99, "date": "2024-03-01" });
    let json = get_body_json(send(&app, "POST", "/api/classify", Some(body.clone())).await).await;
    assert_eq!(json["category"], "Shopping");
    assert_eq!(json["source"], "ai");
    assert!(json["cost_usd"].as_f64().unwrap() > 0.0);
    assert_eq!(server.request_count(), 1);

    // The second lookup is answered from the cache
    let json = get_body_json(send(&app, "POST", "/api/classify", Some(body)).await).await;
    assert_eq!(json["source"], "cache");
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_failing_backend_alerts_the_webhook() {
    let classifier = MockClassifierServer::start_with(MockServerMode::Failing).await;
    let sink = WebhookSink::start().await;
    let mut config = TallyConfig::default();
    config.notifications.webhook_url = Some(sink.url());
    config.notifications.timeout_secs = 5;

    let app = create_router(
        setup_engine_with(config, Some(ClassifierClient::ollama(&classifier.url(), "m"))),
        ServerConfig::default(),
    );
    for i in 0..5 {
        let json = get_body_json(
            send(
                &app,
                "POST",
                "/api/classify",
                Some(json!({ "id": format!("w-{}", i), "description": "UNHEARD OF VENDOR", "amount": 12.0, "date": "2024-03-01" })),
            )
            .await,
        )
        .await;
        assert_eq!(json["fallback"], "classifier_unavailable");
    }

    let response = send(&app, "POST", "/api/monitor/check", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let received = sink.received();
    assert!(received
        .iter()
        .any(|p| p["channel"] == "webhook" && p["alert"]["type"] == "error_rate"));
}

#[tokio::test]
async fn test_resolve_unknown_alert() {
    let app = setup_test_app();
    let response = send(&app, "POST", "/api/alerts/nope/resolve", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_thresholds_update() {
    let app = setup_test_app();

    let response = send(
        &app,
        "PUT",
        "/api/alerts/thresholds",
        Some(json!({ "accuracy": 90.0 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["accuracy"], 90.0);

    let current = get_body_json(send(&app, "GET", "/api/alerts/thresholds", None).await).await;
    assert_eq!(current["accuracy"], 90.0);
    assert_eq!(current["error_rate"], 5.0);

    let out_of_range = send(
        &app,
        "PUT",
        "/api/alerts/thresholds",
        Some(json!({ "error_rate": 250.0 })),
    )
    .await;
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);

    let unknown_key = send(
        &app,
        "PUT",
        "/api/alerts/thresholds",
        Some(json!({ "accuracyy": 90.0 })),
    )
    .await;
    assert!(unknown_key.status().is_client_error());
}

// ========== Metrics ==========

#[tokio::test]
async fn test_performance_report() {
    let app = setup_test_app();
    send(
        &app,
        "POST",
        "/api/classify",
        Some(json!({ "id": "tx-1", "description": "UBER TRIP", "amount": 18.0, "date": "2024-03-01" })),
    )
    .await;

    let response = send(&app, "GET", "/api/metrics/report?period=hour", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["period"], "hour");
    assert_eq!(json["total"], 1);

    let bad = send(&app, "GET", "/api/metrics/report?period=fortnight", None).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prometheus_endpoint() {
    let app = setup_test_app();
    let response = send(&app, "GET", "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = get_body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len() % 3, 0);
    assert_eq!(lines[0], "# HELP tally_classifications_total Transactions classified since start");
    assert_eq!(lines[1], "# TYPE tally_classifications_total counter");
    assert_eq!(lines[2], "tally_classifications_total 0");
}

// ========== Validation & health ==========

#[tokio::test]
async fn test_validation_run_generated() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/validation/run",
        Some(json!({ "scenario": "smoke", "size": 30, "seed": 7 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["scenario"], "smoke");
    assert_eq!(json["total"], 30);
}

#[tokio::test]
async fn test_validation_run_rejects_empty_dataset() {
    let app = setup_test_app();
    let response = send(
        &app,
        "POST",
        "/api/validation/run",
        Some(json!({ "records": [] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();
    let response = send(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["classifier_backend"], "mock");
}
