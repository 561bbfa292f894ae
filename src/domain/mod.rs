// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：扫描、任务、对象资料与结果
/// - 仓库接口（repositories）：持久化网关抽象
/// - 服务（services）：任务规划与扫描协调
///
/// 领域层不依赖于任何外部实现，浏览器与存储都通过特质注入。
pub mod models;
pub mod repositories;
pub mod services;
