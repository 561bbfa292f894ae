// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use crate::application::dto::browser_response::{
    BrowserAcquiredDto, LeaseOperationDto, PoolStatusDto,
};
use crate::pool::{BrowserPool, LeaseId};
use crate::presentation::errors::AppError;

/// 借出一个浏览器
///
/// 成功返回 201，池耗尽或启动失败返回 503
pub async fn acquire_browser(
    Extension(pool): Extension<BrowserPool>,
) -> Result<impl IntoResponse, AppError> {
    let lease = pool.acquire().await?;
    info!(lease_id = %lease.id, "Browser handed out over HTTP");
    Ok((StatusCode::CREATED, Json(BrowserAcquiredDto::from(&lease))))
}

/// 查询池状态
pub async fn pool_status(Extension(pool): Extension<BrowserPool>) -> impl IntoResponse {
    Json(PoolStatusDto {
        status: pool.status(),
    })
}

/// 归还浏览器
pub async fn release_browser(
    Extension(pool): Extension<BrowserPool>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if pool.release(&LeaseId::from(id.as_str())).await {
        (StatusCode::OK, Json(LeaseOperationDto::ok()))
    } else {
        warn!(lease_id = %id, "Release requested for unknown lease");
        (StatusCode::NOT_FOUND, Json(LeaseOperationDto::not_found(&id)))
    }
}

/// 销毁浏览器
pub async fn destroy_browser(
    Extension(pool): Extension<BrowserPool>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if pool.destroy(&LeaseId::from(id.as_str())).await {
        (StatusCode::OK, Json(LeaseOperationDto::ok()))
    } else {
        warn!(lease_id = %id, "Destroy requested for unknown lease");
        (StatusCode::NOT_FOUND, Json(LeaseOperationDto::not_found(&id)))
    }
}
