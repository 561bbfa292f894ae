// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器并登记指标说明
pub fn init_metrics(addr: SocketAddr) {
    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_gauge!("pool_leases_total", "Browsers alive or being provisioned");
    describe_gauge!("pool_leases_idle", "Browsers waiting in the idle set");
    describe_gauge!("pool_leases_leased", "Browsers currently checked out");
    describe_gauge!("pool_acquire_pending", "Callers suspended in acquire");
    describe_counter!("pool_leases_created_total", "Browsers launched by the pool");
    describe_counter!("pool_leases_destroyed_total", "Browsers destroyed, by reason");
    describe_counter!("pool_provision_failures_total", "Browser launches that failed");
    describe_counter!("pool_acquire_timeouts_total", "Acquire calls that hit the wait bound");
    describe_counter!("scan_tasks_total", "Settled scan tasks, by outcome");
    describe_counter!("scan_jobs_total", "Settled scan jobs, by status");
    describe_counter!("scan_jobs_abandoned_total", "Jobs still running when shutdown gave up on them");
    describe_counter!("scan_persistence_failures_total", "Persistence writes that exhausted retries");
    describe_histogram!("scan_task_duration_seconds", "Time from dispatch to settlement of a task");

    info!("Metrics exporter listening on {}", addr);
}
