// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use anyhow::Context;
use scanrs::config::settings::{PersistenceKind, Settings};
use scanrs::domain::repositories::persistence_gateway::PersistenceGateway;
use scanrs::domain::services::job_coordinator::{JobCoordinator, OperatorAlert};
use scanrs::engines::browser_capability::BrowserCapability;
use scanrs::engines::listing_extractor::SelectorExtractor;
use scanrs::engines::CapabilityRegistry;
use scanrs::infrastructure::metrics::init_metrics;
use scanrs::infrastructure::persistence::{HttpPersistenceGateway, InMemoryPersistenceGateway};
use scanrs::pool::chromium::ChromiumLauncher;
use scanrs::pool::BrowserPool;
use scanrs::presentation::routes;
use scanrs::utils::telemetry;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting scanrs...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    if settings.metrics.enabled {
        init_metrics(settings.metrics_addr()?);
    }

    // 3. Browser pool with background eviction
    let launcher = Arc::new(ChromiumLauncher::new(settings.pool.chromium_options()));
    let (pool, eviction) = BrowserPool::start(settings.pool.pool_config(), launcher)?;
    info!(
        min = settings.pool.min,
        max = settings.pool.max,
        "Browser pool started"
    );

    // 4. Capabilities, persistence and the coordinator
    let registry = build_registry(&settings, &pool)?;
    let gateway = build_gateway(&settings)?;
    let coordinator = JobCoordinator::new(registry, gateway, settings.coordinator.policy());
    spawn_alert_logger(&coordinator);

    let planner = Arc::new(settings.planner());
    let app = routes::routes(pool.clone(), coordinator.clone(), planner);

    // 5. Serve until ctrl-c
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // New jobs are refused from here on; running ones get a bounded grace period.
    let abandoned = coordinator
        .shutdown(settings.coordinator.shutdown_grace())
        .await;
    if !abandoned.is_empty() {
        warn!(jobs = abandoned.len(), "Shutting down with unsettled jobs");
    }

    info!("Draining browser pool...");
    pool.drain().await;
    eviction.abort();
    info!("Shutdown complete");

    Ok(())
}

/// 为每个数据源注册基于浏览器的站点能力
fn build_registry(settings: &Settings, pool: &BrowserPool) -> anyhow::Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    for source in &settings.sources {
        let extractor = SelectorExtractor::new(&source.selectors)
            .with_context(|| format!("invalid selectors for source {}", source.id))?;
        let capability = BrowserCapability::new(
            source.invocation,
            pool.clone(),
            extractor,
            settings.pool.navigation_timeout(),
        );
        if registry.register(Arc::new(capability)).is_some() {
            warn!(
                source_id = %source.id,
                invocation = %source.invocation,
                "Source shares an invocation with an earlier source; its selectors win"
            );
        }
    }
    info!(capabilities = registry.len(), "Capability registry built");
    Ok(registry)
}

fn build_gateway(settings: &Settings) -> anyhow::Result<Arc<dyn PersistenceGateway>> {
    let gateway: Arc<dyn PersistenceGateway> = match settings.persistence.kind {
        PersistenceKind::Memory => {
            warn!("Using in-memory persistence; scan records are lost on restart");
            Arc::new(InMemoryPersistenceGateway::new())
        }
        PersistenceKind::Http => {
            let base_url = settings
                .persistence
                .api_base_url
                .clone()
                .context("persistence.api_base_url is not set")?;
            info!("Persisting scan records to {}", base_url);
            Arc::new(HttpPersistenceGateway::new(
                base_url,
                settings.persistence.request_timeout(),
            ))
        }
    };
    Ok(gateway)
}

fn spawn_alert_logger(coordinator: &JobCoordinator) {
    let mut alerts = coordinator.subscribe_alerts();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(OperatorAlert::OutcomeNotPersisted {
                    job_id,
                    task_id,
                    error,
                }) => {
                    error!(job_id = %job_id, task_id = %task_id, "Task outcome was not persisted: {}", error);
                }
                Ok(OperatorAlert::StatusNotPersisted {
                    job_id,
                    status,
                    error,
                }) => {
                    error!(job_id = %job_id, status = ?status, "Job status was not persisted: {}", error);
                }
                Ok(OperatorAlert::JobAbandoned {
                    job_id,
                    pending_tasks,
                }) => {
                    error!(job_id = %job_id, pending_tasks, "Job abandoned at shutdown");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Alert logger lagged, {} alerts skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
