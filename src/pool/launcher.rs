// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::pool::lease::LeaseId;

/// 浏览器池错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// 浏览器进程启动或控制端点发现失败
    #[error("Failed to provision browser: {0}")]
    Provision(String),
    /// 在等待时限内没有可用浏览器
    #[error("Pool exhausted: no browser became available within {0:?}")]
    Exhausted(Duration),
    /// 租约不存在
    #[error("Lease not found: {0}")]
    LeaseNotFound(LeaseId),
    /// 浏览器池正在关闭
    #[error("Browser pool is shutting down")]
    ShuttingDown,
    /// 配置无效
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// 已启动的浏览器
pub struct LaunchedBrowser {
    /// 进程句柄
    pub process: Box<dyn BrowserProcess>,
    /// 远程控制地址
    pub control_url: String,
    /// 远程调试端口
    pub debug_port: u16,
    /// 进程自行终止（崩溃、被外部关闭）时触发
    pub disconnected: oneshot::Receiver<()>,
}

/// 浏览器进程句柄
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// 廉价的存活检查
    fn is_connected(&self) -> bool;

    /// 终止进程，重复调用是无操作
    async fn close(&self) -> Result<(), PoolError>;
}

/// 浏览器启动器
///
/// 浏览器池通过它创建新进程，测试中可替换为不依赖 Chrome 的实现
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// 启动浏览器并等待其控制端点可用
    async fn launch(&self, lease_id: &LeaseId) -> Result<LaunchedBrowser, PoolError>;
}
