// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::services::job_coordinator::CoordinatorError;
use crate::domain::services::task_planner::PlanError;
use crate::pool::PoolError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    /// 错误对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<PoolError>() {
            return match err {
                PoolError::LeaseNotFound(_) => StatusCode::NOT_FOUND,
                PoolError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PoolError::Provision(_) | PoolError::Exhausted(_) | PoolError::ShuttingDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            };
        }
        if let Some(err) = self.0.downcast_ref::<CoordinatorError>() {
            return match err {
                CoordinatorError::JobNotFound(_) => StatusCode::NOT_FOUND,
                CoordinatorError::DuplicateJob(_) => StatusCode::CONFLICT,
                CoordinatorError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                CoordinatorError::Plan(PlanError::InvalidProfile(_)) => StatusCode::BAD_REQUEST,
                CoordinatorError::Plan(_)
                | CoordinatorError::ForeignTask { .. }
                | CoordinatorError::InvalidJob(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }
        if self.0.downcast_ref::<validator::ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, error_message);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
