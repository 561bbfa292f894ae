// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::http::StatusCode;
use scanrs::pool::{LeaseId, LeaseState};
use serde_json::Value;

use super::helpers::{create_test_app, create_test_app_with, pool_config};
use scanrs::engines::CapabilityRegistry;

/// 健康检查测试
#[tokio::test]
async fn health_check_works() {
    let app = create_test_app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn acquire_returns_lease_with_control_url() {
    let app = create_test_app();

    let response = app.server.post("/browsers").await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["id"].as_str().unwrap();
    assert!(id.starts_with("browser-"));
    assert!(body["controlUrl"].as_str().unwrap().starts_with("ws://"));
    assert_eq!(app.pool.lease_state(&LeaseId::from(id)), LeaseState::Leased);
}

#[tokio::test]
async fn status_reports_pool_counts() {
    let app = create_test_app();
    app.server.post("/browsers").await.assert_status(StatusCode::CREATED);

    let response = app.server.get("/browsers/status").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"]["size"], 1);
    assert_eq!(body["status"]["leased"], 1);
    assert_eq!(body["status"]["idle"], 0);
    assert_eq!(body["status"]["max"], 2);
}

#[tokio::test]
async fn release_returns_lease_to_idle_once() {
    let app = create_test_app();
    let body: Value = app.server.post("/browsers").await.json();
    let id = body["id"].as_str().unwrap().to_string();

    let first = app.server.delete(&format!("/browsers/{}/release", id)).await;
    first.assert_status_ok();
    assert_eq!(first.json::<Value>()["success"], true);
    assert_eq!(app.pool.lease_state(&LeaseId::from(id.as_str())), LeaseState::Idle);

    let second = app.server.delete(&format!("/browsers/{}/release", id)).await;
    second.assert_status(StatusCode::NOT_FOUND);
    let body: Value = second.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn released_browser_is_reused() {
    let app = create_test_app();
    let first: Value = app.server.post("/browsers").await.json();
    let id = first["id"].as_str().unwrap();
    app.server
        .delete(&format!("/browsers/{}/release", id))
        .await
        .assert_status_ok();

    let second: Value = app.server.post("/browsers").await.json();

    assert_eq!(second["id"], first["id"]);
    assert_eq!(app.launcher.launched(), 1);
}

#[tokio::test]
async fn destroy_closes_process() {
    let app = create_test_app();
    let body: Value = app.server.post("/browsers").await.json();
    let id = body["id"].as_str().unwrap().to_string();

    app.server
        .delete(&format!("/browsers/{}", id))
        .await
        .assert_status_ok();

    assert_eq!(
        app.pool.lease_state(&LeaseId::from(id.as_str())),
        LeaseState::Destroyed
    );
    assert_eq!(app.launcher.closed(), 1);

    app.server
        .delete(&format!("/browsers/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn exhausted_pool_answers_service_unavailable() {
    let app = create_test_app_with(pool_config(0, 1), |_| CapabilityRegistry::new());
    app.server.post("/browsers").await.assert_status(StatusCode::CREATED);

    let response = app.server.post("/browsers").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("exhausted"));
    assert_eq!(app.launcher.launched(), 1);
}

#[tokio::test]
async fn crashed_browser_disappears_from_status() {
    let app = create_test_app();
    let body: Value = app.server.post("/browsers").await.json();
    let id = LeaseId::from(body["id"].as_str().unwrap());

    app.launcher.crash(&id);
    for _ in 0..50 {
        if app.pool.lease_state(&id) == LeaseState::Destroyed {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(app.pool.lease_state(&id), LeaseState::Destroyed);
    let status: Value = app.server.get("/browsers/status").await.json();
    assert_eq!(status["status"]["size"], 0);
}

#[tokio::test]
async fn drained_pool_rejects_acquire() {
    let app = create_test_app();
    app.server.post("/browsers").await.assert_status(StatusCode::CREATED);

    app.pool.drain().await;

    app.server
        .post("/browsers")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.launcher.closed(), 1);
}
