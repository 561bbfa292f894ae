// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含 HTTP 接口的请求与响应数据结构
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含扫描、任务、对象资料等核心实体，以及任务规划与扫描协调服务
pub mod domain;

/// 引擎模块
///
/// 站点能力接口、能力注册表与基于浏览器的实现
pub mod engines;

/// 基础设施模块
///
/// 提供持久化网关实现与指标导出
pub mod infrastructure;

/// 浏览器池模块
///
/// 管理浏览器进程的借出、归还、销毁与回收
pub mod pool;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现后台回收工作器
pub mod workers;
