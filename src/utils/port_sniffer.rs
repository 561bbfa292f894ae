// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// 端口嗅探范围，从起始端口向后尝试的端口数量
const SCAN_RANGE: u16 = 100;

/// 端口嗅探错误类型
#[derive(Error, Debug)]
pub enum PortSnifferError {
    #[error("Port range starting at {0} exceeds 65535")]
    PortOutOfRange(u16),
    #[error("No available port: {0}")]
    NoAvailablePort(String),
}

/// 端口嗅探器
///
/// 为浏览器进程分配本地调试端口。已分配但尚未被进程绑定的端口
/// 记录在预留集合中，避免并发启动的两个进程拿到同一个端口。
#[derive(Clone, Default)]
pub struct PortSniffer {
    reserved: Arc<Mutex<HashSet<u16>>>,
}

/// 端口预留
///
/// 在被释放（drop）之前，该端口不会被再次分配
pub struct PortReservation {
    port: u16,
    reserved: Arc<Mutex<HashSet<u16>>>,
}

impl PortReservation {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        self.reserved.lock().remove(&self.port);
    }
}

impl PortSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 检查指定端口是否已被占用
    pub fn is_port_in_use(port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// 预留一个可用的本地端口
    ///
    /// `start_port` 为 0 时由操作系统分配临时端口，否则从 `start_port`
    /// 开始向后嗅探，跳过已被占用或已被预留的端口
    ///
    /// # 参数
    ///
    /// * `start_port` - 起始端口号
    ///
    /// # 返回值
    ///
    /// * `Ok(PortReservation)` - 端口预留
    /// * `Err(PortSnifferError)` - 范围内没有可用端口
    pub fn reserve(&self, start_port: u16) -> Result<PortReservation, PortSnifferError> {
        if start_port == 0 {
            return self.reserve_ephemeral();
        }

        let end_port = start_port
            .checked_add(SCAN_RANGE)
            .ok_or(PortSnifferError::PortOutOfRange(start_port))?;

        let mut reserved = self.reserved.lock();
        for port in start_port..=end_port {
            if reserved.contains(&port) {
                continue;
            }
            if Self::is_port_in_use(port) {
                debug!(port, "Port in use, trying next");
                continue;
            }
            reserved.insert(port);
            return Ok(PortReservation {
                port,
                reserved: self.reserved.clone(),
            });
        }

        Err(PortSnifferError::NoAvailablePort(format!(
            "range {}-{} exhausted",
            start_port, end_port
        )))
    }

    fn reserve_ephemeral(&self) -> Result<PortReservation, PortSnifferError> {
        // The OS may hand the same ephemeral port back once the probe socket closes,
        // so keep probing until we get one that is not already reserved.
        for _ in 0..SCAN_RANGE {
            let port = TcpListener::bind(("127.0.0.1", 0))
                .and_then(|listener| listener.local_addr())
                .map(|addr| addr.port())
                .map_err(|e| PortSnifferError::NoAvailablePort(e.to_string()))?;

            let mut reserved = self.reserved.lock();
            if reserved.insert(port) {
                return Ok(PortReservation {
                    port,
                    reserved: self.reserved.clone(),
                });
            }
        }

        Err(PortSnifferError::NoAvailablePort(
            "ephemeral range exhausted".to_string(),
        ))
    }

    /// 当前预留中的端口数量
    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().len()
    }
}
