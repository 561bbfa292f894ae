// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use scanrs::domain::models::job::JobStatus;
use scanrs::domain::models::source::Invocation;
use scanrs::domain::models::task::{ErrorCategory, TaskOutcome};
use scanrs::engines::browser_capability::BrowserCapability;
use scanrs::engines::listing_extractor::{ListingSelectors, SelectorExtractor};
use scanrs::engines::CapabilityRegistry;
use serde_json::{json, Value};
use uuid::Uuid;

use super::helpers::{create_test_app, create_test_app_with, pool_config, StaticCapability};

fn jane_doe() -> Value {
    json!({
        "profile": {
            "firstName": "Jane",
            "lastName": "Doe",
            "city": "Chicago",
            "state": "IL"
        }
    })
}

#[tokio::test]
async fn create_job_is_accepted_and_settles() {
    let app = create_test_app();

    let response = app.server.post("/jobs").json(&jane_doe()).await;

    response.assert_status(StatusCode::ACCEPTED);
    let job_id: Uuid = response.json::<Value>()["jobId"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let report = app.coordinator.wait(job_id).await.unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.success_count, 3);
    assert!(report.persisted);

    let progress: Value = app.server.get(&format!("/jobs/{}", job_id)).await.json();
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["successTaskIds"].as_array().unwrap().len(), 3);
    assert_eq!(progress["tasks"].as_array().unwrap().len(), 3);

    assert_eq!(app.gateway.outcomes_for(job_id).len(), 3);
    assert_eq!(app.gateway.job_status(job_id), Some(JobStatus::Completed));
}

#[tokio::test]
async fn blank_profile_field_is_rejected() {
    let app = create_test_app();

    let response = app
        .server
        .post("/jobs")
        .json(&json!({
            "profile": {"firstName": "Jane", "lastName": "", "city": "Chicago", "state": "IL"}
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.status_writes(), 0);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = create_test_app();

    app.server
        .get(&format!("/jobs/{}", Uuid::new_v4()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_job_id_is_bad_request() {
    let app = create_test_app();

    app.server
        .get("/jobs/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_capability_fails_only_its_task() {
    let app = create_test_app_with(pool_config(0, 2), |_| {
        CapabilityRegistry::new()
            .with(StaticCapability::succeeding(Invocation::SmartBackgroundCheck))
            .with(StaticCapability::failing(Invocation::WhitePages))
    });

    let body: Value = app.server.post("/jobs").json(&jane_doe()).await.json();
    let job_id: Uuid = body["jobId"].as_str().unwrap().parse().unwrap();
    let report = app.coordinator.wait(job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.error_count, 2);

    let progress = app.coordinator.query(job_id).unwrap();
    let peoplewhiz = progress
        .tasks
        .iter()
        .find(|task| task.invocation == Invocation::PeopleWhiz)
        .unwrap();
    assert_eq!(peoplewhiz.outcome, TaskOutcome::Error);
    assert_eq!(
        peoplewhiz.error.as_ref().unwrap().category,
        ErrorCategory::UnknownInvocation
    );
}

#[tokio::test]
async fn unreachable_browsers_fail_the_job_and_return_leases() {
    let app = create_test_app_with(pool_config(0, 1), |pool| {
        Invocation::ALL
            .into_iter()
            .fold(CapabilityRegistry::new(), |registry, invocation| {
                let extractor = SelectorExtractor::new(&ListingSelectors::default()).unwrap();
                registry.with(Arc::new(BrowserCapability::new(
                    invocation,
                    pool.clone(),
                    extractor,
                    Duration::from_secs(5),
                )))
            })
    });

    let body: Value = app.server.post("/jobs").json(&jane_doe()).await.json();
    let job_id: Uuid = body["jobId"].as_str().unwrap().parse().unwrap();
    let report = app.coordinator.wait(job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.error_count, 3);
    assert_eq!(app.gateway.job_status(job_id), Some(JobStatus::Failed));

    let status = app.pool.status();
    assert_eq!(status.leased, 0);
    assert!(status.size <= 1);
}
