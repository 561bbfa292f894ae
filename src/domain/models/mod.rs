// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 扫描（job）：针对一份对象资料的一次完整扫描
/// - 任务（task）：扫描中针对单个数据源的工作单元
/// - 对象资料（profile）：生成任务的个人资料
/// - 数据源（source）：站点能力名称与目标数据源配置
/// - 站点结果（site_results）：任务成功时的结构化记录
pub mod job;
pub mod profile;
pub mod site_results;
pub mod source;
pub mod task;
