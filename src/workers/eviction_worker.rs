// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::pool::BrowserPool;

/// 空闲浏览器回收工作器
///
/// 按配置的间隔扫描浏览器池，回收空闲超时的浏览器并补足最小数量。
/// 不依赖借出请求触发，浏览器池关闭后自行退出。
pub struct EvictionWorker {
    pool: BrowserPool,
}

impl EvictionWorker {
    pub fn new(pool: BrowserPool) -> Self {
        Self { pool }
    }

    /// 运行工作器
    pub async fn run(&self) {
        let period = self.pool.config().eviction_interval;
        info!(interval_ms = period.as_millis() as u64, "Browser eviction worker started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.pool.is_closed() {
                break;
            }

            let evicted = self.pool.evict_idle().await;
            if evicted > 0 {
                info!("Evicted {} idle browsers", evicted);
            } else {
                debug!("No idle browsers past their TTL");
            }
            self.pool.ensure_minimum();
        }

        info!("Browser eviction worker stopped");
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }
}
