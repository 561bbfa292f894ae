// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use metrics::{counter, histogram};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::models::job::{derive_job_status, CrawlJob, JobStatus};
use crate::domain::models::profile::SubjectProfile;
use crate::domain::models::site_results::SiteResults;
use crate::domain::models::task::{CrawlTask, ErrorCategory, TaskError, TaskOutcome};
use crate::domain::repositories::persistence_gateway::{
    JobStatusRecord, PersistenceGateway, TaskOutcomeRecord,
};
use crate::domain::services::task_planner::{PlanError, TaskPlanner};
use crate::engines::{CapabilityRegistry, InvocationError};
use crate::utils::retry_policy::RetryPolicy;

const ALERT_CAPACITY: usize = 256;

/// 协调器错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),
    #[error("Job already started: {0}")]
    DuplicateJob(Uuid),
    #[error("Task {task_id} does not belong to job {job_id}")]
    ForeignTask { job_id: Uuid, task_id: Uuid },
    #[error("Job cannot be started: {0}")]
    InvalidJob(String),
    #[error("Coordinator is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// 协调器策略
#[derive(Debug, Clone)]
pub struct CoordinatorPolicy {
    /// 任务结果写入的重试策略
    pub outcome_retry: RetryPolicy,
    /// 扫描终态写入的重试策略，预算大于任务结果
    pub status_retry: RetryPolicy,
    /// 单次站点能力执行的时限，为空时不限制
    pub task_timeout: Option<Duration>,
    /// 扫描结束后报告的保留时长，过期后查询返回 JobNotFound
    pub job_retention: Duration,
}

impl Default for CoordinatorPolicy {
    fn default() -> Self {
        Self {
            outcome_retry: RetryPolicy::with_attempts(3, Duration::from_millis(500)),
            status_retry: RetryPolicy::with_attempts(10, Duration::from_millis(500)),
            task_timeout: None,
            job_retention: Duration::from_secs(3600),
        }
    }
}

/// 扫描进度快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub tasks: Vec<CrawlTask>,
    pub success_task_ids: Vec<Uuid>,
    pub error_task_ids: Vec<Uuid>,
}

/// 扫描结束报告
///
/// `persisted` 为 false 时终态没有写入成功，扫描保持 Running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub persisted: bool,
    pub success_count: usize,
    pub error_count: usize,
}

/// 需要运维介入的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperatorAlert {
    /// 任务结果重试用尽仍未写入
    OutcomeNotPersisted {
        job_id: Uuid,
        task_id: Uuid,
        error: String,
    },
    /// 扫描终态重试用尽仍未写入
    StatusNotPersisted {
        job_id: Uuid,
        status: JobStatus,
        error: String,
    },
    /// 关停时仍未结束的扫描
    JobAbandoned { job_id: Uuid, pending_tasks: usize },
}

/// 一次扫描的运行状态
///
/// 锁只包住同步的读写，不跨越 await
struct JobRun {
    job: RwLock<CrawlJob>,
    tasks: RwLock<Vec<CrawlTask>>,
    index: HashMap<Uuid, usize>,
    report: watch::Sender<Option<JobReport>>,
}

impl JobRun {
    fn new(job: CrawlJob, tasks: Vec<CrawlTask>) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.id, i))
            .collect();
        let (report, _) = watch::channel(None);
        Self {
            job: RwLock::new(job),
            tasks: RwLock::new(tasks),
            index,
            report,
        }
    }

    fn job_id(&self) -> Uuid {
        self.job.read().id
    }

    /// 写入任务结果，已处于终态时忽略
    fn settle(
        &self,
        task_id: Uuid,
        outcome: Result<SiteResults, TaskError>,
        elapsed: Duration,
    ) -> Option<TaskOutcomeRecord> {
        let &i = self.index.get(&task_id)?;
        let mut tasks = self.tasks.write();
        let task = &mut tasks[i];
        let settled = match outcome {
            Ok(results) => task.settle_success(results),
            Err(error) => task.settle_error(error),
        };
        match settled {
            Ok(()) => TaskOutcomeRecord::from_task(task, elapsed),
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Ignoring duplicate settlement");
                None
            }
        }
    }

    /// 屏障之后仍未结束的任务一律记为错误
    fn settle_orphans(&self) -> Vec<TaskOutcomeRecord> {
        let mut tasks = self.tasks.write();
        tasks
            .iter_mut()
            .filter(|task| task.outcome == TaskOutcome::Pending)
            .filter_map(|task| {
                let error = TaskError::new(
                    ErrorCategory::Panic,
                    "invocation ended without settling",
                );
                task.settle_error(error).ok()?;
                TaskOutcomeRecord::from_task(task, Duration::ZERO)
            })
            .collect()
    }

    fn progress(&self) -> JobProgress {
        let (job_id, status) = {
            let job = self.job.read();
            (job.id, job.status)
        };
        let tasks = self.tasks.read().clone();
        let ids_with = |outcome: TaskOutcome| {
            tasks
                .iter()
                .filter(|task| task.outcome == outcome)
                .map(|task| task.id)
                .collect::<Vec<_>>()
        };
        JobProgress {
            job_id,
            status,
            success_task_ids: ids_with(TaskOutcome::Success),
            error_task_ids: ids_with(TaskOutcome::Error),
            tasks,
        }
    }
}

struct CoordinatorInner {
    registry: CapabilityRegistry,
    gateway: Arc<dyn PersistenceGateway>,
    policy: CoordinatorPolicy,
    jobs: DashMap<Uuid, Arc<JobRun>>,
    alerts: broadcast::Sender<OperatorAlert>,
    closed: AtomicBool,
}

/// 扫描协调器
///
/// 并行执行一次扫描的全部任务，单个任务的失败不影响其他任务；
/// 所有任务结束后推导并写入扫描终态。
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl JobCoordinator {
    pub fn new(
        registry: CapabilityRegistry,
        gateway: Arc<dyn PersistenceGateway>,
        policy: CoordinatorPolicy,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        Self {
            inner: Arc::new(CoordinatorInner {
                registry,
                gateway,
                policy,
                jobs: DashMap::new(),
                alerts,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// 订阅运维告警
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<OperatorAlert> {
        self.inner.alerts.subscribe()
    }

    /// 规划并启动一次扫描
    pub fn submit(
        &self,
        planner: &TaskPlanner,
        profile: SubjectProfile,
    ) -> Result<Uuid, CoordinatorError> {
        let job_id = Uuid::new_v4();
        let tasks = planner.plan(job_id, &profile)?;
        let job = CrawlJob::new(job_id, profile, &tasks);
        self.start(job, tasks)
    }

    /// 启动扫描
    ///
    /// 分发所有任务后立即返回，不等待任务完成
    ///
    /// # 参数
    ///
    /// * `job` - 处于 Pending 的扫描
    /// * `tasks` - 扫描的任务列表
    ///
    /// # 返回值
    ///
    /// * `Ok(Uuid)` - 扫描ID
    /// * `Err(CoordinatorError)` - 扫描重复启动、任务不属于该扫描或协调器正在关停
    pub fn start(&self, mut job: CrawlJob, tasks: Vec<CrawlTask>) -> Result<Uuid, CoordinatorError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(CoordinatorError::ShuttingDown);
        }
        if let Some(task) = tasks.iter().find(|task| task.job_id != job.id) {
            return Err(CoordinatorError::ForeignTask {
                job_id: job.id,
                task_id: task.id,
            });
        }
        let job_id = job.id;
        if self.inner.jobs.contains_key(&job_id) {
            return Err(CoordinatorError::DuplicateJob(job_id));
        }
        job.start()
            .map_err(|e| CoordinatorError::InvalidJob(e.to_string()))?;

        let run = Arc::new(JobRun::new(job, tasks.clone()));
        match self.inner.jobs.entry(job_id) {
            Entry::Occupied(_) => return Err(CoordinatorError::DuplicateJob(job_id)),
            Entry::Vacant(slot) => {
                slot.insert(run.clone());
            }
        }

        let mut invocations = JoinSet::new();
        for task in tasks {
            invocations.spawn(self.clone().run_task(run.clone(), task));
        }
        info!(job_id = %job_id, tasks = invocations.len(), "Job dispatched");

        tokio::spawn(self.clone().settle_job(run, invocations));
        Ok(job_id)
    }

    /// 查询扫描进度，不等待进行中的任务
    pub fn query(&self, job_id: Uuid) -> Result<JobProgress, CoordinatorError> {
        Ok(self.run(job_id)?.progress())
    }

    /// 等待扫描结束
    pub async fn wait(&self, job_id: Uuid) -> Result<JobReport, CoordinatorError> {
        let mut report = self.run(job_id)?.report.subscribe();
        let settled = *report
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CoordinatorError::JobNotFound(job_id))?;
        settled.ok_or(CoordinatorError::JobNotFound(job_id))
    }

    /// 停止接收新扫描，并在时限内等待在途扫描结束
    ///
    /// # 参数
    ///
    /// * `grace` - 等待在途扫描的总时限
    ///
    /// # 返回值
    ///
    /// 时限内仍未结束的扫描ID，每个都已发出 `JobAbandoned` 告警
    pub async fn shutdown(&self, grace: Duration) -> Vec<Uuid> {
        self.inner.closed.store(true, Ordering::SeqCst);

        let in_flight: Vec<Arc<JobRun>> = self
            .inner
            .jobs
            .iter()
            .filter(|entry| entry.value().report.borrow().is_none())
            .map(|entry| entry.value().clone())
            .collect();
        if in_flight.is_empty() {
            return Vec::new();
        }
        info!(
            jobs = in_flight.len(),
            grace_secs = grace.as_secs(),
            "Waiting for in-flight jobs to settle"
        );

        let deadline = tokio::time::Instant::now() + grace;
        let mut abandoned = Vec::new();
        for run in in_flight {
            let mut report = run.report.subscribe();
            let settled = matches!(
                tokio::time::timeout_at(deadline, report.wait_for(Option::is_some)).await,
                Ok(Ok(_))
            );
            if settled {
                continue;
            }

            let job_id = run.job_id();
            let pending_tasks = run
                .tasks
                .read()
                .iter()
                .filter(|task| task.outcome == TaskOutcome::Pending)
                .count();
            error!(
                job_id = %job_id,
                pending_tasks,
                "Abandoning job that did not settle before shutdown"
            );
            counter!("scan_jobs_abandoned_total").increment(1);
            let _ = self.inner.alerts.send(OperatorAlert::JobAbandoned {
                job_id,
                pending_tasks,
            });
            abandoned.push(job_id);
        }
        abandoned
    }

    /// 内存中仍保留的扫描数
    pub fn tracked_jobs(&self) -> usize {
        self.inner.jobs.len()
    }

    fn run(&self, job_id: Uuid) -> Result<Arc<JobRun>, CoordinatorError> {
        self.inner
            .jobs
            .get(&job_id)
            .map(|run| run.value().clone())
            .ok_or(CoordinatorError::JobNotFound(job_id))
    }

    async fn run_task(self, run: Arc<JobRun>, task: CrawlTask) {
        let started = Instant::now();
        let outcome = self.invoke(&task).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(results) => info!(
                job_id = %task.job_id,
                task_id = %task.id,
                source_id = %task.source_id,
                listings = results.listings.len(),
                "Task succeeded"
            ),
            Err(e) => warn!(
                job_id = %task.job_id,
                task_id = %task.id,
                source_id = %task.source_id,
                error = %e,
                "Task failed"
            ),
        }
        let label = if outcome.is_ok() { "success" } else { "error" };
        counter!("scan_tasks_total", "outcome" => label).increment(1);
        histogram!("scan_task_duration_seconds").record(elapsed.as_secs_f64());

        if let Some(record) = run.settle(task.id, outcome, elapsed) {
            self.persist_outcome(&record).await;
        }
    }

    async fn invoke(&self, task: &CrawlTask) -> Result<SiteResults, TaskError> {
        let capability = self.inner.registry.resolve(task.invocation)?;
        let call = AssertUnwindSafe(capability.invoke(task)).catch_unwind();

        let result = match self.inner.policy.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => return Err(InvocationError::Timeout(limit).into()),
            },
            None => call.await,
        };

        match result {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(e)) => Err(e.into()),
            Err(panic) => Err(InvocationError::Panicked(panic_message(panic.as_ref())).into()),
        }
    }

    async fn settle_job(self, run: Arc<JobRun>, mut invocations: JoinSet<()>) {
        let job_id = run.job_id();
        while let Some(joined) = invocations.join_next().await {
            if let Err(e) = joined {
                error!(job_id = %job_id, error = %e, "Task invocation aborted");
            }
        }

        for record in run.settle_orphans() {
            self.persist_outcome(&record).await;
        }

        let progress = run.progress();
        let status =
            derive_job_status(progress.tasks.iter().map(|task| task.outcome));
        let persisted = self.persist_status(job_id, status).await;

        if persisted {
            if let Err(e) = run.job.write().finish(status) {
                error!(job_id = %job_id, error = %e, "Failed to finish job");
            }
            counter!("scan_jobs_total", "status" => status.to_string()).increment(1);
            info!(
                job_id = %job_id,
                status = %status,
                succeeded = progress.success_task_ids.len(),
                failed = progress.error_task_ids.len(),
                "Job settled"
            );
        }

        run.report.send_replace(Some(JobReport {
            job_id,
            status,
            persisted,
            success_count: progress.success_task_ids.len(),
            error_count: progress.error_task_ids.len(),
        }));

        // Waiters already subscribed keep their copy of the report.
        tokio::time::sleep(self.inner.policy.job_retention).await;
        self.inner.jobs.remove(&job_id);
        debug!(job_id = %job_id, "Settled job evicted");
    }

    async fn persist_outcome(&self, record: &TaskOutcomeRecord) {
        let gateway = &self.inner.gateway;
        let result = self
            .inner
            .policy
            .outcome_retry
            .execute("record_task_outcome", || gateway.record_task_outcome(record))
            .await;

        match result {
            Ok(()) => debug!(task_id = %record.task_id, "Task outcome recorded"),
            Err(e) => {
                error!(
                    job_id = %record.job_id,
                    task_id = %record.task_id,
                    error = %e,
                    "Giving up on recording task outcome"
                );
                counter!("scan_persistence_failures_total", "kind" => "outcome").increment(1);
                let _ = self.inner.alerts.send(OperatorAlert::OutcomeNotPersisted {
                    job_id: record.job_id,
                    task_id: record.task_id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn persist_status(&self, job_id: Uuid, status: JobStatus) -> bool {
        let record = JobStatusRecord { job_id, status };
        let gateway = &self.inner.gateway;
        let result = self
            .inner
            .policy
            .status_retry
            .execute("record_job_status", || gateway.record_job_status(&record))
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    job_id = %job_id,
                    status = %status,
                    error = %e,
                    "Giving up on recording job status, job stays running"
                );
                counter!("scan_persistence_failures_total", "kind" => "status").increment(1);
                let _ = self.inner.alerts.send(OperatorAlert::StatusNotPersisted {
                    job_id,
                    status,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "job_coordinator_test.rs"]
mod tests;
