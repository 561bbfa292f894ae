// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 持久化网关实现
///
/// - http_gateway：写入外部扫描记录服务
/// - memory_gateway：进程内存储，用于单机部署与测试
pub mod http_gateway;
pub mod memory_gateway;

pub use http_gateway::HttpPersistenceGateway;
pub use memory_gateway::InMemoryPersistenceGateway;
