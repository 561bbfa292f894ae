// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::profile::SubjectProfile;
use crate::domain::models::task::{CrawlTask, DomainError, TaskOutcome};

/// 扫描任务
///
/// 针对一份对象资料、覆盖所有已启用数据源的一次扫描。
/// 状态只通过 [`derive_job_status`] 推导后写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    /// 扫描唯一标识符
    pub id: Uuid,
    /// 对象资料
    pub profile: SubjectProfile,
    /// 有序的任务ID列表
    pub task_ids: Vec<Uuid>,
    /// 扫描状态
    pub status: JobStatus,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 扫描状态
///
/// Pending → Running → Completed | Failed，终态不可再转换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 根据任务结果推导扫描终态
///
/// - 没有任务：Completed
/// - 全部任务失败：Failed
/// - 至少一个任务成功：Completed
pub fn derive_job_status<I>(outcomes: I) -> JobStatus
where
    I: IntoIterator<Item = TaskOutcome>,
{
    let mut total = 0usize;
    let mut errors = 0usize;
    for outcome in outcomes {
        total += 1;
        if outcome == TaskOutcome::Error {
            errors += 1;
        }
    }

    if total > 0 && errors == total {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    }
}

impl CrawlJob {
    /// 为已规划的任务创建扫描
    pub fn new(id: Uuid, profile: SubjectProfile, tasks: &[CrawlTask]) -> Self {
        let now = Utc::now();
        Self {
            id,
            profile,
            task_ids: tasks.iter().map(|t| t.id).collect(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// 开始分发任务
    ///
    /// 将状态从 Pending 变更为 Running
    pub fn start(&mut self) -> Result<(), DomainError> {
        match self.status {
            JobStatus::Pending => {
                self.status = JobStatus::Running;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(DomainError::InvalidStateTransition {
                from: other.to_string(),
                to: JobStatus::Running.to_string(),
            }),
        }
    }

    /// 写入终态
    ///
    /// 只允许从 Running 变更为 Completed 或 Failed
    pub fn finish(&mut self, status: JobStatus) -> Result<(), DomainError> {
        if self.status != JobStatus::Running || !status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
