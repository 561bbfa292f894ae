// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::models::site_results::SiteResults;
use crate::domain::models::source::Invocation;
use crate::domain::models::task::CrawlTask;
use crate::engines::listing_extractor::SelectorExtractor;
use crate::engines::traits::{CrawlerCapability, InvocationError};
use crate::pool::{BrowserLease, BrowserPool, PoolError};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 基于浏览器池的站点能力
///
/// 每次执行借出一个浏览器，通过其远程控制地址连接、打开目标页、
/// 等待结果就绪并按选择器提取记录。成功后归还租约；
/// 出错、超时或被取消时销毁浏览器，不把半途中断的页面留在池中。
pub struct BrowserCapability {
    invocation: Invocation,
    pool: BrowserPool,
    extractor: SelectorExtractor,
    navigation_timeout: Duration,
}

impl BrowserCapability {
    pub fn new(
        invocation: Invocation,
        pool: BrowserPool,
        extractor: SelectorExtractor,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            invocation,
            pool,
            extractor,
            navigation_timeout,
        }
    }

    async fn drive(
        &self,
        lease: &BrowserLease,
        task: &CrawlTask,
    ) -> Result<SiteResults, InvocationError> {
        let (browser, mut handler) = Browser::connect(lease.control_url.as_str())
            .await
            .map_err(|e| {
                InvocationError::Pool(PoolError::Provision(format!(
                    "failed to connect to {}: {}",
                    lease.id, e
                )))
            })?;

        // Only the CDP connection is torn down, the pooled process keeps running.
        let _handler = AbortOnDrop(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        }));

        self.scrape(&browser, task).await
    }

    async fn scrape(
        &self,
        browser: &Browser,
        task: &CrawlTask,
    ) -> Result<SiteResults, InvocationError> {
        let page = browser
            .new_page(task.target_url.as_str())
            .await
            .map_err(|e| {
                InvocationError::UnexpectedPage(format!(
                    "navigation to {} failed: {}",
                    task.target_url, e
                ))
            })?;

        let extracted = self.read_page(&page, task).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }
        extracted
    }

    async fn read_page(&self, page: &Page, task: &CrawlTask) -> Result<SiteResults, InvocationError> {
        if let Some(ready) = self.extractor.ready_selector() {
            wait_for_selector(page, ready).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| InvocationError::Extraction(e.to_string()))?;
        let url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| task.target_url.clone());

        Ok(self.extractor.extract(&url, &html))
    }
}

/// 释放时中止后台任务
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn wait_for_selector(page: &Page, selector: &str) {
    while page.find_element(selector).await.is_err() {
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

#[async_trait]
impl CrawlerCapability for BrowserCapability {
    fn invocation(&self) -> Invocation {
        self.invocation
    }

    async fn invoke(&self, task: &CrawlTask) -> Result<SiteResults, InvocationError> {
        let start = Instant::now();
        let mut lease = self.pool.lease().await?;
        // A drop before settling (cancelled by a task deadline) destroys the browser.
        lease.discard_on_drop();
        debug!(task_id = %task.id, lease_id = %lease.id, "Driving {}", self.invocation);

        let outcome = tokio::time::timeout(self.navigation_timeout, self.drive(&lease, task))
            .await
            .map_err(|_| InvocationError::Timeout(self.navigation_timeout))
            .and_then(|result| result);

        let results = match outcome {
            Ok(results) => {
                lease.release().await;
                results
            }
            Err(e) => {
                warn!(task_id = %task.id, lease_id = %lease.id, error = %e, "Discarding browser after failed invocation");
                lease.destroy().await;
                return Err(e);
            }
        };
        info!(
            task_id = %task.id,
            invocation = %self.invocation,
            listings = results.listings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Capability finished"
        );
        Ok(results)
    }
}
