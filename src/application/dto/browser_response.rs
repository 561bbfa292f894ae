// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::pool::{BrowserLease, PoolStatus};

/// 借出浏览器的响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserAcquiredDto {
    pub id: String,
    /// CDP WebSocket 地址
    pub control_url: String,
}

impl From<&BrowserLease> for BrowserAcquiredDto {
    fn from(lease: &BrowserLease) -> Self {
        Self {
            id: lease.id.to_string(),
            control_url: lease.control_url.clone(),
        }
    }
}

/// 池状态响应
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatusDto {
    pub status: PoolStatus,
}

/// 归还或销毁的响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOperationDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LeaseOperationDto {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn not_found(id: &str) -> Self {
        Self {
            success: false,
            error: Some(format!("Browser lease not found: {}", id)),
        }
    }
}
