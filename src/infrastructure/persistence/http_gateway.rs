// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::domain::repositories::persistence_gateway::{
    JobStatusRecord, PersistenceError, PersistenceGateway, TaskOutcomeRecord,
};

/// 基于 HTTP 的持久化网关
///
/// - 任务结果：`POST {base}/scan-results`
/// - 扫描状态：`PATCH {base}/scans/{jobId}/status`
///
/// 409 视为重复写入同一终态，按成功处理
pub struct HttpPersistenceGateway {
    /// HTTP 客户端
    client: reqwest::Client,
    /// 接口基础地址
    base_url: String,
}

impl HttpPersistenceGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<(), PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::CONFLICT {
            debug!(url = %response.url(), "Record already stored");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> PersistenceError {
    PersistenceError::Transport(e.to_string())
}

#[async_trait]
impl PersistenceGateway for HttpPersistenceGateway {
    async fn record_task_outcome(&self, record: &TaskOutcomeRecord) -> Result<(), PersistenceError> {
        let response = self
            .client
            .post(format!("{}/scan-results", self.base_url))
            .json(record)
            .send()
            .await
            .map_err(transport)?;
        Self::check(response).await
    }

    async fn record_job_status(&self, record: &JobStatusRecord) -> Result<(), PersistenceError> {
        let response = self
            .client
            .patch(format!("{}/scans/{}/status", self.base_url, record.job_id))
            .json(&json!({ "status": record.status }))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response).await
    }
}
