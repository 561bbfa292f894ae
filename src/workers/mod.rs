// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 后台周期任务，目前只有浏览器池的空闲回收
pub mod eviction_worker;

pub use eviction_worker::EvictionWorker;
