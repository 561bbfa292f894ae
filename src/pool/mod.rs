// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 浏览器资源池模块
///
/// 管理数量有限、创建代价高的浏览器进程：
/// - 配置（config）：池容量、空闲回收、借出校验
/// - 租约（lease）：借出给任务的浏览器句柄
/// - 启动器（launcher）：进程启动与断连通知的抽象
/// - chromium：基于 chromiumoxide 的启动器实现
/// - 浏览器池（browser_pool）：借出、归还、销毁与回收
pub mod browser_pool;
pub mod chromium;
pub mod config;
pub mod launcher;
pub mod lease;

#[cfg(test)]
pub(crate) mod test_support;

pub use browser_pool::{BrowserPool, LeaseGuard};
pub use config::PoolConfig;
pub use launcher::{BrowserLauncher, BrowserProcess, LaunchedBrowser, PoolError};
pub use lease::{BrowserLease, LeaseId, LeaseState, PoolStatus};
