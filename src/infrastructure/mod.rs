// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// - 指标（metrics）：Prometheus 导出器
/// - 持久化（persistence）：持久化网关的 HTTP 与内存实现
pub mod metrics;
pub mod persistence;
