// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::job_request::{CreateJobRequestDto, CreateJobResponseDto};
use crate::domain::services::job_coordinator::JobCoordinator;
use crate::domain::services::task_planner::TaskPlanner;
use crate::presentation::errors::AppError;

/// 创建扫描
///
/// 规划任务并分发后立即返回 202，不等待任何任务完成
pub async fn create_job(
    Extension(coordinator): Extension<JobCoordinator>,
    Extension(planner): Extension<Arc<TaskPlanner>>,
    Json(payload): Json<CreateJobRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let job_id = coordinator.submit(&planner, payload.profile)?;
    info!(job_id = %job_id, "Job accepted");

    Ok((StatusCode::ACCEPTED, Json(CreateJobResponseDto { job_id })))
}

/// 查询扫描进度
pub async fn get_job(
    Extension(coordinator): Extension<JobCoordinator>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let progress = coordinator.query(id)?;
    Ok(Json(progress))
}
