// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::site_results::SiteResults;
use crate::domain::models::source::Invocation;
use crate::domain::models::task::{CrawlTask, ErrorCategory, TaskError};
use crate::pool::PoolError;

/// 站点能力错误类型
#[derive(Error, Debug)]
pub enum InvocationError {
    /// 没有为该名称注册站点能力
    #[error("No capability registered for {0}")]
    UnknownInvocation(Invocation),
    /// 执行超时
    #[error("Invocation timed out after {0:?}")]
    Timeout(Duration),
    /// 页面状态与预期不符
    #[error("Unexpected page state: {0}")]
    UnexpectedPage(String),
    /// 结果提取失败
    #[error("Extraction failed: {0}")]
    Extraction(String),
    /// 无法获得浏览器
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// 执行过程中发生 panic
    #[error("Invocation panicked: {0}")]
    Panicked(String),
}

impl InvocationError {
    /// 对应的任务错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            InvocationError::UnknownInvocation(_) => ErrorCategory::UnknownInvocation,
            InvocationError::Timeout(_) => ErrorCategory::Timeout,
            InvocationError::UnexpectedPage(_) | InvocationError::Extraction(_) => {
                ErrorCategory::Invocation
            }
            InvocationError::Pool(PoolError::Exhausted(_)) => ErrorCategory::PoolExhausted,
            InvocationError::Pool(_) => ErrorCategory::Provision,
            InvocationError::Panicked(_) => ErrorCategory::Panic,
        }
    }
}

impl From<InvocationError> for TaskError {
    fn from(error: InvocationError) -> Self {
        TaskError::new(error.category(), error.to_string())
    }
}

/// 站点能力
///
/// 针对单个数据源执行页面交互并返回结构化结果。实现方自行从浏览器池
/// 借出浏览器，并保证无论成功、失败还是 panic 都归还租约。
#[async_trait]
pub trait CrawlerCapability: Send + Sync {
    /// 该能力对应的名称
    fn invocation(&self) -> Invocation;

    /// 执行一个任务
    ///
    /// # 参数
    ///
    /// * `task` - 爬取任务，包含目标URL与对象资料
    ///
    /// # 返回值
    ///
    /// * `Ok(SiteResults)` - 结构化结果
    /// * `Err(InvocationError)` - 执行失败
    async fn invoke(&self, task: &CrawlTask) -> Result<SiteResults, InvocationError>;
}
