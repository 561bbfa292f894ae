// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 扫描记录由外部系统保存，领域层只依赖持久化网关特质，
/// 具体实现由基础设施层提供。
pub mod persistence_gateway;
