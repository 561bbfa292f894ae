// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::presentation::handlers::browser_handler;

/// 创建浏览器池服务路由
pub fn browser_routes() -> Router {
    Router::new()
        .route("/browsers", post(browser_handler::acquire_browser))
        .route("/browsers/status", get(browser_handler::pool_status))
        .route(
            "/browsers/{id}/release",
            delete(browser_handler::release_browser),
        )
        .route("/browsers/{id}", delete(browser_handler::destroy_browser))
}
