// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;
use scanrs::domain::models::site_results::SiteResults;
use scanrs::domain::models::source::{Invocation, TargetSource};
use scanrs::domain::models::task::CrawlTask;
use scanrs::domain::repositories::persistence_gateway::PersistenceGateway;
use scanrs::domain::services::job_coordinator::{CoordinatorPolicy, JobCoordinator};
use scanrs::domain::services::task_planner::TaskPlanner;
use scanrs::engines::{CapabilityRegistry, CrawlerCapability, InvocationError};
use scanrs::infrastructure::persistence::InMemoryPersistenceGateway;
use scanrs::pool::{
    BrowserLauncher, BrowserPool, BrowserProcess, LaunchedBrowser, LeaseId, PoolConfig, PoolError,
};
use scanrs::presentation::routes;
use scanrs::utils::retry_policy::RetryPolicy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct FakeProcess(Arc<AtomicBool>);

#[async_trait]
impl BrowserProcess for FakeProcess {
    fn is_connected(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), PoolError> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 不启动 Chrome 的启动器
///
/// 控制地址指向不可连接的端口，驱动它的站点能力会以连接失败结束
#[derive(Default)]
pub struct FakeLauncher {
    launched: AtomicUsize,
    closed: Mutex<HashMap<LeaseId, Arc<AtomicBool>>>,
    disconnects: Mutex<HashMap<LeaseId, oneshot::Sender<()>>>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed
            .lock()
            .values()
            .filter(|closed| closed.load(Ordering::SeqCst))
            .count()
    }

    pub fn crash(&self, id: &LeaseId) {
        if let Some(closed) = self.closed.lock().get(id) {
            closed.store(true, Ordering::SeqCst);
        }
        if let Some(tx) = self.disconnects.lock().remove(id) {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, lease_id: &LeaseId) -> Result<LaunchedBrowser, PoolError> {
        let n = self.launched.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        self.closed.lock().insert(lease_id.clone(), closed.clone());
        self.disconnects.lock().insert(lease_id.clone(), tx);

        Ok(LaunchedBrowser {
            process: Box::new(FakeProcess(closed)),
            control_url: format!("ws://127.0.0.1:1/devtools/browser/{}", lease_id),
            debug_port: 9222 + n as u16,
            disconnected: rx,
        })
    }
}

/// 直接返回空结果或固定错误的站点能力
pub struct StaticCapability {
    invocation: Invocation,
    fail: bool,
}

impl StaticCapability {
    pub fn succeeding(invocation: Invocation) -> Arc<Self> {
        Arc::new(Self {
            invocation,
            fail: false,
        })
    }

    #[allow(dead_code)]
    pub fn failing(invocation: Invocation) -> Arc<Self> {
        Arc::new(Self {
            invocation,
            fail: true,
        })
    }
}

#[async_trait]
impl CrawlerCapability for StaticCapability {
    fn invocation(&self) -> Invocation {
        self.invocation
    }

    async fn invoke(&self, task: &CrawlTask) -> Result<SiteResults, InvocationError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.fail {
            return Err(InvocationError::UnexpectedPage("no results section".into()));
        }
        Ok(SiteResults {
            url: task.target_url.clone(),
            listings: vec![],
        })
    }
}

pub fn pool_config(min: usize, max: usize) -> PoolConfig {
    PoolConfig {
        min,
        max,
        idle_ttl: Duration::from_secs(600),
        eviction_interval: Duration::from_secs(60),
        test_on_borrow: true,
        acquire_timeout: Duration::from_millis(200),
    }
}

pub fn quick_policy() -> CoordinatorPolicy {
    let mut outcome_retry = RetryPolicy::with_attempts(3, Duration::from_millis(1));
    outcome_retry.enable_jitter = false;
    let mut status_retry = RetryPolicy::with_attempts(5, Duration::from_millis(1));
    status_retry.enable_jitter = false;
    CoordinatorPolicy {
        outcome_retry,
        status_retry,
        task_timeout: Some(Duration::from_secs(10)),
        job_retention: Duration::from_secs(600),
    }
}

pub fn sources() -> Vec<TargetSource> {
    vec![
        TargetSource {
            id: "smartbackgroundchecks".to_string(),
            invocation: Invocation::SmartBackgroundCheck,
            url_template:
                "https://www.smartbackgroundchecks.com/people/{firstName}-{lastName}/{city}/{lastName}"
                    .to_string(),
            active: true,
        },
        TargetSource {
            id: "peoplewhiz".to_string(),
            invocation: Invocation::PeopleWhiz,
            url_template: "https://www.peoplewhiz.com/hflow/results/{firstName}/~/{lastName}/~/{state}/~"
                .to_string(),
            active: true,
        },
        TargetSource {
            id: "whitepages".to_string(),
            invocation: Invocation::WhitePages,
            url_template: "https://www.whitepages.com/name/{firstName}-{lastName}/{city}-{state}"
                .to_string(),
            active: true,
        },
    ]
}

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub pool: BrowserPool,
    pub launcher: Arc<FakeLauncher>,
    pub coordinator: JobCoordinator,
    pub gateway: Arc<InMemoryPersistenceGateway>,
}

/// 用假启动器和给定的站点能力组装完整的 HTTP 应用
pub fn create_test_app_with(
    config: PoolConfig,
    build_registry: impl FnOnce(&BrowserPool) -> CapabilityRegistry,
) -> TestApp {
    let launcher = FakeLauncher::new();
    let pool = BrowserPool::new(config, launcher.clone()).unwrap();
    let registry = build_registry(&pool);

    let gateway = Arc::new(InMemoryPersistenceGateway::new());
    let gateway_dyn: Arc<dyn PersistenceGateway> = gateway.clone();
    let coordinator = JobCoordinator::new(registry, gateway_dyn, quick_policy());
    let planner = Arc::new(TaskPlanner::new(sources()));

    let app = routes::routes(pool.clone(), coordinator.clone(), planner);
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        pool,
        launcher,
        coordinator,
        gateway,
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(pool_config(0, 2), |_| {
        Invocation::ALL
            .into_iter()
            .fold(CapabilityRegistry::new(), |registry, invocation| {
                registry.with(StaticCapability::succeeding(invocation))
            })
    })
}
