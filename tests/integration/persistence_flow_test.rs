// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use scanrs::domain::models::job::JobStatus;
use scanrs::domain::models::profile::SubjectProfile;
use scanrs::domain::models::source::Invocation;
use scanrs::domain::services::job_coordinator::{JobCoordinator, OperatorAlert};
use scanrs::domain::services::task_planner::TaskPlanner;
use scanrs::engines::CapabilityRegistry;
use scanrs::infrastructure::persistence::HttpPersistenceGateway;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{quick_policy, sources, StaticCapability};

fn coordinator_against(server: &MockServer) -> JobCoordinator {
    let registry = Invocation::ALL
        .into_iter()
        .fold(CapabilityRegistry::new(), |registry, invocation| {
            registry.with(StaticCapability::succeeding(invocation))
        });
    let gateway = Arc::new(HttpPersistenceGateway::new(
        format!("{}/api", server.uri()),
        Duration::from_secs(2),
    ));
    JobCoordinator::new(registry, gateway, quick_policy())
}

fn profile() -> SubjectProfile {
    SubjectProfile::new("Jane", "Doe", "Chicago", "IL")
}

#[tokio::test]
async fn outcomes_and_status_reach_the_records_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan-results"))
        .and(body_partial_json(json!({"status": "success"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"^/api/scans/[0-9a-f-]+/status$"))
        .and(body_partial_json(json!({"status": "completed"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_against(&server);
    let job_id = coordinator
        .submit(&TaskPlanner::new(sources()), profile())
        .unwrap();
    let report = coordinator.wait(job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.persisted);
}

#[tokio::test]
async fn duplicate_writes_count_as_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan-results"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let coordinator = coordinator_against(&server);
    let job_id = coordinator
        .submit(&TaskPlanner::new(sources()), profile())
        .unwrap();
    let report = coordinator.wait(job_id).await.unwrap();

    assert!(report.persisted);
    assert_eq!(coordinator.query(job_id).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn rejected_outcomes_raise_alerts_without_blocking_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan-results"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad record"))
        // A 4xx is not retried: one attempt per task.
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_against(&server);
    let mut alerts = coordinator.subscribe_alerts();
    let job_id = coordinator
        .submit(&TaskPlanner::new(sources()), profile())
        .unwrap();
    let report = coordinator.wait(job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.persisted);

    let mut outcome_alerts = 0;
    while let Ok(alert) = alerts.try_recv() {
        if matches!(alert, OperatorAlert::OutcomeNotPersisted { job_id: id, .. } if id == job_id) {
            outcome_alerts += 1;
        }
    }
    assert_eq!(outcome_alerts, 3);
}

#[tokio::test]
async fn unreachable_status_endpoint_keeps_job_running() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan-results"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(503))
        // Retried up to the status budget.
        .expect(5)
        .mount(&server)
        .await;

    let coordinator = coordinator_against(&server);
    let mut alerts = coordinator.subscribe_alerts();
    let job_id = coordinator
        .submit(&TaskPlanner::new(sources()), profile())
        .unwrap();
    let report = coordinator.wait(job_id).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(!report.persisted);
    assert_eq!(coordinator.query(job_id).unwrap().status, JobStatus::Running);

    let alert = alerts.recv().await.unwrap();
    assert!(matches!(
        alert,
        OperatorAlert::StatusNotPersisted { status: JobStatus::Completed, .. }
    ));
}
