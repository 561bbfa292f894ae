// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crate::pool::launcher::PoolError;

/// 浏览器池配置
///
/// 池实例的整个生命周期内不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// 预热保持的最小浏览器数量
    pub min: usize,
    /// 同时存在的最大浏览器数量
    pub max: usize,
    /// 空闲超过该时长的浏览器会被回收
    pub idle_ttl: Duration,
    /// 回收扫描间隔
    pub eviction_interval: Duration,
    /// 借出前是否校验浏览器存活
    pub test_on_borrow: bool,
    /// 借出等待上限，超过后返回 PoolExhausted
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 2,
            max: 10,
            idle_ttl: Duration::from_secs(10 * 60),
            eviction_interval: Duration::from_secs(30),
            test_on_borrow: true,
            acquire_timeout: Duration::from_secs(120),
        }
    }
}

impl PoolConfig {
    /// 校验配置
    ///
    /// # 返回值
    ///
    /// * `Ok(PoolConfig)` - 合法配置
    /// * `Err(PoolError::InvalidConfig)` - `max` 为 0 或 `min` 大于 `max`
    pub fn validated(self) -> Result<Self, PoolError> {
        if self.max == 0 {
            return Err(PoolError::InvalidConfig("max must be at least 1".to_string()));
        }
        if self.min > self.max {
            return Err(PoolError::InvalidConfig(format!(
                "min ({}) must not exceed max ({})",
                self.min, self.max
            )));
        }
        if self.eviction_interval.is_zero() {
            return Err(PoolError::InvalidConfig(
                "eviction interval must be positive".to_string(),
            ));
        }
        Ok(self)
    }
}
