// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 任务规划（task_planner）：把对象资料展开为各数据源的任务
/// - 扫描协调（job_coordinator）：并行执行任务、隔离失败并推导扫描终态
pub mod job_coordinator;
pub mod task_planner;
