// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 租约标识符，形如 `browser-<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(String);

impl LeaseId {
    pub fn generate() -> Self {
        Self(format!("browser-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LeaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LeaseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 租约状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    /// 在池中空闲
    Idle,
    /// 已借出
    Leased,
    /// 已销毁（或池中不存在）
    Destroyed,
}

/// 浏览器租约
///
/// 持有者通过 `control_url` 远程驱动浏览器。底层进程归浏览器池所有，
/// 持有者只在一个任务期间借用它。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserLease {
    pub id: LeaseId,
    /// 远程控制地址（CDP WebSocket）
    pub control_url: String,
    /// 远程调试端口
    pub debug_port: u16,
    pub created_at: DateTime<Utc>,
}

/// 浏览器池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// 当前存在（含创建中）的浏览器数量
    pub size: usize,
    pub idle: usize,
    pub leased: usize,
    /// 正在等待借出的调用数
    pub pending: usize,
    pub min: usize,
    pub max: usize,
}
