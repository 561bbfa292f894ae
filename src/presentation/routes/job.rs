// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::routing::{get, post};
use axum::Router;

use crate::presentation::handlers::job_handler;

/// 创建扫描相关路由
pub fn job_routes() -> Router {
    Router::new()
        .route("/jobs", post(job_handler::create_job))
        .route("/jobs/{id}", get(job_handler::get_job))
}
