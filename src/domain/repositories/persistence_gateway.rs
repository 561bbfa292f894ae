// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::job::JobStatus;
use crate::domain::models::profile::SubjectProfile;
use crate::domain::models::site_results::SiteResults;
use crate::domain::models::source::Invocation;
use crate::domain::models::task::{CrawlTask, TaskError, TaskOutcome};
use crate::utils::retry_policy::Retryable;

/// 持久化错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// 网络或连接错误
    #[error("Transport error: {0}")]
    Transport(String),
    /// 对端拒绝写入
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// 已存在不同的终态值
    #[error("Conflicting terminal value already recorded for {0}")]
    Conflict(String),
}

impl Retryable for PersistenceError {
    fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::Transport(_) => true,
            PersistenceError::Rejected { status, .. } => *status >= 500,
            PersistenceError::Conflict(_) => false,
        }
    }
}

/// 任务结果附带的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeMetadata {
    /// 调用的站点能力
    pub invocation: Invocation,
    /// 任务负载
    pub task_data: SubjectProfile,
    /// 结果产生时间
    pub timestamp: DateTime<Utc>,
    /// 执行耗时（毫秒）
    pub response_time_ms: u64,
}

/// 任务结果记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcomeRecord {
    pub job_id: Uuid,
    pub task_id: Uuid,
    pub source_id: String,
    pub url: String,
    pub status: TaskOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SiteResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub metadata: OutcomeMetadata,
}

impl TaskOutcomeRecord {
    /// 由已结束的任务生成结果记录
    ///
    /// # 返回值
    ///
    /// 任务仍处于 Pending 时返回 None
    pub fn from_task(task: &CrawlTask, response_time: Duration) -> Option<Self> {
        if !task.outcome.is_terminal() {
            return None;
        }
        let url = task
            .result
            .as_ref()
            .map(|r| r.url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| task.target_url.clone());

        Some(Self {
            job_id: task.job_id,
            task_id: task.id,
            source_id: task.source_id.clone(),
            url,
            status: task.outcome,
            data: task.result.clone(),
            error: task.error.clone(),
            metadata: OutcomeMetadata {
                invocation: task.invocation,
                task_data: task.payload.clone(),
                timestamp: task.updated_at,
                response_time_ms: response_time.as_millis() as u64,
            },
        })
    }
}

/// 扫描状态记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// 持久化网关特质
///
/// 扫描记录的存储由外部系统负责。两个写入都是幂等的：
/// 对同一终态值重复写入视为成功。
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// 写入任务结果
    async fn record_task_outcome(&self, record: &TaskOutcomeRecord) -> Result<(), PersistenceError>;

    /// 写入扫描终态
    async fn record_job_status(&self, record: &JobStatusRecord) -> Result<(), PersistenceError>;
}
