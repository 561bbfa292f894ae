// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::trace::TraceLayer;

use crate::domain::services::job_coordinator::JobCoordinator;
use crate::domain::services::task_planner::TaskPlanner;
use crate::pool::BrowserPool;

pub mod browser;
pub mod job;

/// 创建应用路由
///
/// # 参数
///
/// * `pool` - 浏览器池
/// * `coordinator` - 扫描协调器
/// * `planner` - 任务规划器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(pool: BrowserPool, coordinator: JobCoordinator, planner: Arc<TaskPlanner>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version));

    Router::new()
        .merge(public_routes)
        .merge(browser::browser_routes())
        .merge(job::job_routes())
        .layer(Extension(pool))
        .layer(Extension(coordinator))
        .layer(Extension(planner))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
