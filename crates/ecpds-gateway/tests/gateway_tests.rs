// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes exercised end to end against the test harness.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use ecpds_core::{PersistentStore, TransferStatus};
use ecpds_gateway::{AuthConfig, GatewayState, HealthState, router};
use ecpds_test_utils::TestHarness;

const TOKEN: &str = "test-token";

fn state(h: &TestHarness, token: Option<&str>) -> GatewayState {
    GatewayState {
        tickets: Arc::clone(&h.tickets),
        master: Arc::clone(&h.master),
        proxy: Arc::clone(&h.proxy),
        auth: AuthConfig {
            bearer_token: token.map(str::to_string),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render: Some(Arc::new(|| "ecpds_up 1\n".to_string())),
        },
    }
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"))
        .header("x-ecpds-user", "alice");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(h: &TestHarness, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state(h, Some(TOKEN))).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let h = TestHarness::builder().build().unwrap();
    let app = router(state(&h, Some(TOKEN)));

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tickets"], 0);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn v1_requires_the_bearer_token() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let missing = Request::get("/v1/destinations/DEST1/status")
        .body(Body::empty())
        .unwrap();
    let response = router(state(&h, Some(TOKEN))).oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::get("/v1/destinations/DEST1/status")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let response = router(state(&h, Some(TOKEN))).oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unconfigured = request("GET", "/v1/destinations/DEST1/status", None);
    let response = router(state(&h, None)).oneshot(unconfigured).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hold_is_attributed_to_the_caller() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, _) = send(
        &h,
        request("POST", "/v1/destinations/DEST1/hold", Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&h, request("GET", "/v1/destinations/DEST1/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STOP");
    assert_eq!(body["display"], "Stopped");

    let records = h.audit.records().await;
    assert!(
        records
            .iter()
            .any(|r| r.actor == "alice" && r.operation == "hold" && r.target == "DEST1")
    );
    assert_eq!(h.dispatch.shutdowns().await, vec![("DEST1".to_string(), true)]);
}

#[tokio::test]
async fn unknown_destination_is_404() {
    let h = TestHarness::builder().build().unwrap();
    let (status, body) = send(&h, request("GET", "/v1/destinations/NOPE/status", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn bulk_restart_reports_counts() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    h.seed("DEST2", "b.bin", TransferStatus::Wait).await.unwrap();

    let (status, body) = send(
        &h,
        request("POST", "/v1/destinations/restart-all", Some(json!({"graceful": false}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], json!([]));
}

#[tokio::test]
async fn transfer_status_routes() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, body) = send(
        &h,
        request(
            "PUT",
            &format!("/v1/transfers/{}/status", id.0),
            Some(json!({"status": "HOLD"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    let stored = h.memory.get_data_transfer(id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransferStatus::Hold);

    let (status, body) = send(
        &h,
        request(
            "GET",
            &format!("/v1/transfers/{}/status-allowed?status=DONE&kind=progress", id.0),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);

    let (status, body) = send(
        &h,
        request(
            "PUT",
            &format!("/v1/transfers/{}/status", id.0),
            Some(json!({"status": "DONE", "kind": "progress"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, _) = send(
        &h,
        request(
            "PUT",
            &format!("/v1/transfers/{}/status", id.0),
            Some(json!({"status": "WAIT", "kind": "sideways"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn priority_out_of_range_conflicts() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, _) = send(
        &h,
        request(
            "PUT",
            &format!("/v1/transfers/{}/priority", id.0),
            Some(json!({"priority": 7})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        h.memory.get_data_transfer(id).await.unwrap().unwrap().priority,
        7
    );

    let (status, _) = send(
        &h,
        request(
            "PUT",
            &format!("/v1/transfers/{}/priority", id.0),
            Some(json!({"priority": 500})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn download_through_tickets_and_proxy_check() {
    let h = TestHarness::builder().build().unwrap();
    let id = h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, socket) = send(
        &h,
        request("POST", "/v1/proxy/input", Some(json!({"path": "data/DEST1/a.bin"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(socket["domain"], "data");
    let ticket = socket["ticket"].as_u64().unwrap();

    let (status, view) = send(
        &h,
        request("POST", &format!("/v1/tickets/{ticket}/redeem"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["direction"], "READ");

    let (status, _) = send(
        &h,
        request(
            "POST",
            &format!("/v1/tickets/{ticket}/complete"),
            Some(json!({"outcome": "succeeded", "bytes": 1024})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, completion) = send(
        &h,
        request("POST", "/v1/proxy/check", Some(json!({"socket": socket}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completion["outcome"], "succeeded");
    assert_eq!(completion["bytes"], 1024);

    let history = h.memory.list_transfer_history(id).await.unwrap();
    assert_eq!(history.len(), 1);

    let (status, body) = send(
        &h,
        request("POST", &format!("/v1/tickets/{ticket}/check"), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "ticket_not_found");
}

#[tokio::test]
async fn ranged_data_read_is_416() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();
    let (status, body) = send(
        &h,
        request(
            "POST",
            "/v1/proxy/input",
            Some(json!({"path": "data/DEST1/a.bin", "offset": 0, "length": 10})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(body["kind"], "range_not_supported");
}

#[tokio::test]
async fn listing_and_size_of_data_files() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, body) = send(&h, request("GET", "/v1/proxy/list?path=data/DEST1", None)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert_eq!(names, vec!["a.bin"]);

    let (status, body) = send(&h, request("GET", "/v1/proxy/size?path=data/DEST1/a.bin", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 1024);
}

#[tokio::test]
async fn deleting_a_destination_returns_the_report() {
    let h = TestHarness::builder().build().unwrap();
    h.seed("DEST1", "a.bin", TransferStatus::Wait).await.unwrap();

    let (status, body) = send(
        &h,
        request("DELETE", "/v1/destinations/DEST1?purge_all=true", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destination_removed"], true);
    assert_eq!(body["removed_hosts"], json!(["dest1-host"]));
    assert!(h.memory.get_destination("DEST1").await.unwrap().is_none());

    let (status, _) = send(&h, request("DELETE", "/v1/destinations/DEST1", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
