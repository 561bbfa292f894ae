// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// - browser_handler：浏览器池服务接口
/// - job_handler：扫描提交与进度查询接口
pub mod browser_handler;
pub mod job_handler;
