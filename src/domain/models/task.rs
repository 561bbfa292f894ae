// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::profile::SubjectProfile;
use crate::domain::models::site_results::SiteResults;
use crate::domain::models::source::Invocation;

/// 爬取任务
///
/// 一次扫描中针对单个数据源的工作单元。任务结果只能从
/// Pending 写入一次终态（Success 或 Error），之后不可再改写。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTask {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 所属扫描ID
    pub job_id: Uuid,
    /// 目标数据源标识
    pub source_id: String,
    /// 调用的站点能力
    pub invocation: Invocation,
    /// 目标URL
    pub target_url: String,
    /// 任务负载
    pub payload: SubjectProfile,
    /// 任务结果状态
    pub outcome: TaskOutcome,
    /// 成功时的结构化结果
    pub result: Option<SiteResults>,
    /// 失败时的错误详情
    pub error: Option<TaskError>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 任务结果状态
///
/// Pending → Success | Error，终态只写一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    #[default]
    Pending,
    Success,
    Error,
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::Pending)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskOutcome::Pending => write!(f, "pending"),
            TaskOutcome::Success => write!(f, "success"),
            TaskOutcome::Error => write!(f, "error"),
        }
    }
}

impl FromStr for TaskOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskOutcome::Pending),
            "success" => Ok(TaskOutcome::Success),
            "error" => Ok(TaskOutcome::Error),
            _ => Err(()),
        }
    }
}

/// 任务错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 浏览器无法创建或无法发现控制端点
    Provision,
    /// 等待浏览器超出时限
    PoolExhausted,
    /// 站点能力执行失败
    Invocation,
    /// 执行超时
    Timeout,
    /// 未注册的站点能力
    UnknownInvocation,
    /// 执行过程中发生 panic 或被中止
    Panic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ErrorCategory::Provision => "provision",
            ErrorCategory::PoolExhausted => "pool_exhausted",
            ErrorCategory::Invocation => "invocation",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::UnknownInvocation => "unknown_invocation",
            ErrorCategory::Panic => "panic",
        };
        f.write_str(s)
    }
}

/// 任务错误详情
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub category: ErrorCategory,
    pub message: String,
}

impl TaskError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换，当状态转换不符合业务规则时发生
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CrawlTask {
    /// 创建一个新的待执行任务
    pub fn new(
        job_id: Uuid,
        source_id: impl Into<String>,
        invocation: Invocation,
        target_url: impl Into<String>,
        payload: SubjectProfile,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            source_id: source_id.into(),
            invocation,
            target_url: target_url.into(),
            payload,
            outcome: TaskOutcome::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 记录成功结果
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 结果已写入
    /// * `Err(DomainError)` - 任务已处于终态，原结果保持不变
    pub fn settle_success(&mut self, result: SiteResults) -> Result<(), DomainError> {
        self.ensure_pending(TaskOutcome::Success)?;
        self.outcome = TaskOutcome::Success;
        self.result = Some(result);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 记录失败结果
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 错误已写入
    /// * `Err(DomainError)` - 任务已处于终态，原结果保持不变
    pub fn settle_error(&mut self, error: TaskError) -> Result<(), DomainError> {
        self.ensure_pending(TaskOutcome::Error)?;
        self.outcome = TaskOutcome::Error;
        self.error = Some(error);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self, to: TaskOutcome) -> Result<(), DomainError> {
        if self.outcome.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.outcome.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> CrawlTask {
        CrawlTask::new(
            Uuid::new_v4(),
            "whitepages",
            Invocation::WhitePages,
            "https://www.whitepages.com/",
            SubjectProfile::new("Jane", "Doe", "Chicago", "IL"),
        )
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = task();
        assert_eq!(task.outcome, TaskOutcome::Pending);
        assert!(task.result.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_settle_success_once() {
        let mut task = task();
        let results = SiteResults {
            url: "https://www.whitepages.com/name/Jane-Doe".to_string(),
            listings: vec![],
        };

        task.settle_success(results.clone()).unwrap();
        assert_eq!(task.outcome, TaskOutcome::Success);

        let second = task.settle_error(TaskError::new(ErrorCategory::Timeout, "late"));
        assert!(matches!(
            second,
            Err(DomainError::InvalidStateTransition { .. })
        ));
        assert_eq!(task.outcome, TaskOutcome::Success);
        assert_eq!(task.result, Some(results));
        assert!(task.error.is_none());
    }

    #[test]
    fn test_settle_error_is_not_overwritten() {
        let mut task = task();
        task.settle_error(TaskError::new(ErrorCategory::Invocation, "no results"))
            .unwrap();

        assert!(task.settle_success(SiteResults::default()).is_err());
        assert!(task
            .settle_error(TaskError::new(ErrorCategory::Timeout, "again"))
            .is_err());
        assert_eq!(task.outcome, TaskOutcome::Error);
        assert_eq!(task.error.as_ref().unwrap().message, "no results");
    }

    #[test]
    fn test_outcome_string_forms() {
        assert_eq!(TaskOutcome::Success.to_string(), "success");
        assert_eq!("error".parse::<TaskOutcome>(), Ok(TaskOutcome::Error));
        assert!("done".parse::<TaskOutcome>().is_err());
    }
}
