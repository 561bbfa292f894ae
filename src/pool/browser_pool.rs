// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::pool::config::PoolConfig;
use crate::pool::launcher::{BrowserLauncher, BrowserProcess, LaunchedBrowser, PoolError};
use crate::pool::lease::{BrowserLease, LeaseId, LeaseState, PoolStatus};
use crate::workers::eviction_worker::EvictionWorker;

/// 池中的一个浏览器
struct LeaseEntry {
    lease: BrowserLease,
    process: Arc<dyn BrowserProcess>,
    state: LeaseState,
    idle_since: Instant,
}

/// 池的簿记
///
/// `idle` 中恰好是状态为 Idle 的条目ID。锁只在同步代码中短暂持有，
/// 从不跨越 await。
#[derive(Default)]
struct PoolBook {
    entries: HashMap<LeaseId, LeaseEntry>,
    idle: VecDeque<LeaseId>,
    provisioning: usize,
}

impl PoolBook {
    fn size(&self) -> usize {
        self.entries.len() + self.provisioning
    }

    fn leased(&self) -> usize {
        self.entries.len() - self.idle.len()
    }

    fn remove(&mut self, id: &LeaseId) -> Option<LeaseEntry> {
        let entry = self.entries.remove(id)?;
        if entry.state == LeaseState::Idle {
            self.idle.retain(|idle_id| idle_id != id);
        }
        Some(entry)
    }
}

struct PoolInner {
    config: PoolConfig,
    launcher: Arc<dyn BrowserLauncher>,
    book: Mutex<PoolBook>,
    available: Notify,
    pending: AtomicUsize,
    closed: AtomicBool,
}

/// 一个正在创建中的浏览器所占的容量
///
/// 创建失败或调用方被取消时，drop 会归还容量并唤醒等待者
struct ProvisionSlot {
    inner: Arc<PoolInner>,
    armed: bool,
}

impl ProvisionSlot {
    fn reserve(inner: &Arc<PoolInner>, book: &mut PoolBook) -> Self {
        book.provisioning += 1;
        Self {
            inner: inner.clone(),
            armed: true,
        }
    }

    fn complete(mut self, book: &mut PoolBook) {
        book.provisioning -= 1;
        self.armed = false;
    }
}

impl Drop for ProvisionSlot {
    fn drop(&mut self) {
        if self.armed {
            self.inner.book.lock().provisioning -= 1;
            self.inner.available.notify_waiters();
        }
    }
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Checkout {
    Reuse(BrowserLease, Arc<dyn BrowserProcess>),
    Create(ProvisionSlot),
    Wait,
}

enum Release {
    Returned,
    AlreadyIdle,
    Invalid(LeaseEntry),
    Unknown,
}

/// 浏览器池
///
/// 同时存在的浏览器不超过 `max`，空闲时保持至少 `min` 个预热实例。
/// 同一租约不会被借出两次，已销毁的租约不会再被借出。
/// 克隆得到的是同一个池的句柄。
#[derive(Clone)]
pub struct BrowserPool {
    inner: Arc<PoolInner>,
}

impl BrowserPool {
    /// 创建浏览器池
    ///
    /// 不会启动后台回收，也不会预热；需要时调用 [`BrowserPool::start`]
    pub fn new(config: PoolConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self, PoolError> {
        let config = config.validated()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                launcher,
                book: Mutex::new(PoolBook::default()),
                available: Notify::new(),
                pending: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// 创建浏览器池并启动后台回收与预热
    ///
    /// # 返回值
    ///
    /// * `Ok((BrowserPool, JoinHandle))` - 浏览器池与回收工作器句柄
    /// * `Err(PoolError)` - 配置无效
    pub fn start(
        config: PoolConfig,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<(Self, JoinHandle<()>), PoolError> {
        let pool = Self::new(config, launcher)?;
        let handle = EvictionWorker::new(pool.clone()).start();
        pool.ensure_minimum();
        Ok((pool, handle))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// 借出一个浏览器
    ///
    /// 优先复用空闲浏览器；没有空闲且未达上限时创建新浏览器；
    /// 否则挂起等待归还，直到 `acquire_timeout` 到期。
    ///
    /// # 返回值
    ///
    /// * `Ok(BrowserLease)` - 借出的租约
    /// * `Err(PoolError::Provision)` - 新浏览器启动失败
    /// * `Err(PoolError::Exhausted)` - 等待超时
    /// * `Err(PoolError::ShuttingDown)` - 浏览器池已关闭
    pub async fn acquire(&self) -> Result<BrowserLease, PoolError> {
        let timeout = self.inner.config.acquire_timeout;
        let deadline = Instant::now() + timeout;
        let _pending = PendingGuard::enter(&self.inner.pending);

        loop {
            if self.is_closed() {
                return Err(PoolError::ShuttingDown);
            }

            // Register for wake-ups before inspecting the book so a release
            // between the check and the wait is not lost.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.checkout() {
                Checkout::Reuse(lease, process) => {
                    if self.inner.config.test_on_borrow && !process.is_connected() {
                        warn!(lease_id = %lease.id, "Idle browser failed validation, destroying");
                        self.destroy(&lease.id).await;
                        continue;
                    }
                    debug!(lease_id = %lease.id, "Browser checked out");
                    self.publish_metrics();
                    return Ok(lease);
                }
                Checkout::Create(slot) => {
                    return self.provision(slot, LeaseState::Leased).await;
                }
                Checkout::Wait => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        warn!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for a browser");
                        counter!("pool_acquire_timeouts_total").increment(1);
                        return Err(PoolError::Exhausted(timeout));
                    }
                }
            }
        }
    }

    /// 借出一个浏览器，并在守卫释放时自动归还
    pub async fn lease(&self) -> Result<LeaseGuard, PoolError> {
        let lease = self.acquire().await?;
        Ok(LeaseGuard {
            pool: self.clone(),
            lease,
            settled: false,
            discard_on_drop: false,
        })
    }

    /// 归还租约
    ///
    /// 浏览器仍存活时放回空闲集合，否则销毁。重复归还是无操作。
    ///
    /// # 返回值
    ///
    /// 租约存在（或已在空闲集合中）返回 true，未知或已销毁返回 false
    pub async fn release(&self, id: &LeaseId) -> bool {
        let action = {
            let mut book = self.inner.book.lock();
            let closed = self.is_closed();
            let current = book
                .entries
                .get(id)
                .map(|entry| (entry.state, entry.process.is_connected()));

            match current {
                None => Release::Unknown,
                Some((LeaseState::Idle, _)) => Release::AlreadyIdle,
                Some((_, true)) if !closed => {
                    if let Some(entry) = book.entries.get_mut(id) {
                        entry.state = LeaseState::Idle;
                        entry.idle_since = Instant::now();
                    }
                    book.idle.push_back(id.clone());
                    Release::Returned
                }
                Some(_) => match book.remove(id) {
                    Some(entry) => Release::Invalid(entry),
                    None => Release::Unknown,
                },
            }
        };

        match action {
            Release::Returned => {
                debug!(lease_id = %id, "Browser returned to pool");
                self.inner.available.notify_waiters();
                self.publish_metrics();
                true
            }
            Release::AlreadyIdle => {
                debug!(lease_id = %id, "Browser already idle, ignoring release");
                true
            }
            Release::Invalid(entry) => {
                warn!(lease_id = %id, "Released browser is no longer connected, destroying");
                Self::close_process(&entry).await;
                counter!("pool_leases_destroyed_total", "reason" => "invalid_on_release").increment(1);
                self.after_removal();
                true
            }
            Release::Unknown => {
                debug!(lease_id = %id, "Release for unknown lease");
                false
            }
        }
    }

    /// 销毁租约
    ///
    /// 无条件终止进程并移除簿记
    ///
    /// # 返回值
    ///
    /// 租约存在返回 true，未知或已销毁返回 false
    pub async fn destroy(&self, id: &LeaseId) -> bool {
        let removed = self.inner.book.lock().remove(id);
        let Some(entry) = removed else {
            debug!(lease_id = %id, "Destroy for unknown lease");
            return false;
        };

        Self::close_process(&entry).await;
        info!(lease_id = %id, "Browser destroyed");
        counter!("pool_leases_destroyed_total", "reason" => "explicit").increment(1);
        self.after_removal();
        true
    }

    /// 廉价的存活检查，未知租约视为无效
    pub fn validate(&self, id: &LeaseId) -> bool {
        self.inner
            .book
            .lock()
            .entries
            .get(id)
            .is_some_and(|entry| entry.process.is_connected())
    }

    /// 查询租约当前状态
    pub fn lease_state(&self, id: &LeaseId) -> LeaseState {
        self.inner
            .book
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.state)
            .unwrap_or(LeaseState::Destroyed)
    }

    /// 回收空闲超时的浏览器
    ///
    /// # 返回值
    ///
    /// 本次回收的浏览器数量
    pub async fn evict_idle(&self) -> usize {
        let ttl = self.inner.config.idle_ttl;
        let expired: Vec<LeaseEntry> = {
            let mut book = self.inner.book.lock();
            let ids: Vec<LeaseId> = book
                .idle
                .iter()
                .filter(|id| {
                    book.entries
                        .get(*id)
                        .is_some_and(|entry| entry.idle_since.elapsed() > ttl)
                })
                .cloned()
                .collect();
            ids.iter().filter_map(|id| book.remove(id)).collect()
        };

        for entry in &expired {
            Self::close_process(entry).await;
            info!(lease_id = %entry.lease.id, "Evicted idle browser");
        }

        if !expired.is_empty() {
            counter!("pool_leases_destroyed_total", "reason" => "idle_ttl")
                .increment(expired.len() as u64);
            self.after_removal();
        }
        expired.len()
    }

    /// 在后台补足到 `min` 个浏览器
    pub fn ensure_minimum(&self) {
        if self.is_closed() {
            return;
        }

        let slots: Vec<ProvisionSlot> = {
            let mut book = self.inner.book.lock();
            let deficit = self.inner.config.min.saturating_sub(book.size());
            (0..deficit)
                .map(|_| ProvisionSlot::reserve(&self.inner, &mut book))
                .collect()
        };

        for slot in slots {
            let pool = self.clone();
            tokio::spawn(async move {
                if let Err(e) = pool.provision(slot, LeaseState::Idle).await {
                    warn!(error = %e, "Failed to replenish browser pool");
                }
            });
        }
    }

    /// 浏览器池状态快照
    pub fn status(&self) -> PoolStatus {
        let book = self.inner.book.lock();
        PoolStatus {
            size: book.size(),
            idle: book.idle.len(),
            leased: book.leased(),
            pending: self.inner.pending.load(Ordering::SeqCst),
            min: self.inner.config.min,
            max: self.inner.config.max,
        }
    }

    /// 关闭浏览器池
    ///
    /// 拒绝新的借出请求，并终止所有空闲和已借出的浏览器
    pub async fn drain(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let entries: Vec<LeaseEntry> = {
            let mut book = self.inner.book.lock();
            book.idle.clear();
            book.entries.drain().map(|(_, entry)| entry).collect()
        };
        self.inner.available.notify_waiters();

        let count = entries.len();
        for entry in &entries {
            Self::close_process(entry).await;
        }
        info!(count, "Browser pool drained");
        self.publish_metrics();
    }

    fn checkout(&self) -> Checkout {
        let mut book = self.inner.book.lock();
        while let Some(id) = book.idle.pop_front() {
            if let Some(entry) = book.entries.get_mut(&id) {
                entry.state = LeaseState::Leased;
                return Checkout::Reuse(entry.lease.clone(), entry.process.clone());
            }
        }

        if book.size() < self.inner.config.max {
            return Checkout::Create(ProvisionSlot::reserve(&self.inner, &mut book));
        }
        Checkout::Wait
    }

    async fn provision(
        &self,
        slot: ProvisionSlot,
        state: LeaseState,
    ) -> Result<BrowserLease, PoolError> {
        let id = LeaseId::generate();
        let launched = match self.inner.launcher.launch(&id).await {
            Ok(launched) => launched,
            Err(e) => {
                drop(slot);
                error!(lease_id = %id, error = %e, "Failed to provision browser");
                counter!("pool_provision_failures_total").increment(1);
                return Err(match e {
                    PoolError::Provision(_) => e,
                    other => PoolError::Provision(other.to_string()),
                });
            }
        };

        let LaunchedBrowser {
            process,
            control_url,
            debug_port,
            disconnected,
        } = launched;
        let process: Arc<dyn BrowserProcess> = Arc::from(process);
        let lease = BrowserLease {
            id: id.clone(),
            control_url,
            debug_port,
            created_at: Utc::now(),
        };

        let accepted = {
            let mut book = self.inner.book.lock();
            slot.complete(&mut book);
            if self.is_closed() {
                false
            } else {
                book.entries.insert(
                    id.clone(),
                    LeaseEntry {
                        lease: lease.clone(),
                        process: process.clone(),
                        state,
                        idle_since: Instant::now(),
                    },
                );
                if state == LeaseState::Idle {
                    book.idle.push_back(id.clone());
                }
                true
            }
        };

        if !accepted {
            if let Err(e) = process.close().await {
                warn!(lease_id = %id, error = %e, "Failed to close browser provisioned during shutdown");
            }
            self.inner.available.notify_waiters();
            return Err(PoolError::ShuttingDown);
        }

        self.watch_disconnect(id.clone(), disconnected);
        if state == LeaseState::Idle {
            self.inner.available.notify_waiters();
        }

        info!(lease_id = %id, debug_port, state = ?state, "Browser provisioned");
        counter!("pool_leases_created_total").increment(1);
        self.publish_metrics();
        Ok(lease)
    }

    fn watch_disconnect(&self, id: LeaseId, disconnected: oneshot::Receiver<()>) {
        let pool = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            // The launcher signals on every process exit, including closes issued by
            // the pool. A dropped sender means it will never signal. Removal of an
            // untracked lease is a no-op, so both cases are safe.
            if disconnected.await.is_err() {
                return;
            }
            if let Some(inner) = pool.upgrade() {
                BrowserPool { inner }.handle_disconnect(&id).await;
            }
        });
    }

    async fn handle_disconnect(&self, id: &LeaseId) {
        let removed = self.inner.book.lock().remove(id);
        match removed {
            Some(entry) => {
                warn!(lease_id = %id, state = ?entry.state, "Browser disconnected, removing from pool");
                Self::close_process(&entry).await;
                counter!("pool_leases_destroyed_total", "reason" => "disconnected").increment(1);
                self.after_removal();
            }
            None => debug!(lease_id = %id, "Disconnect for lease no longer tracked"),
        }
    }

    fn after_removal(&self) {
        self.inner.available.notify_waiters();
        self.publish_metrics();
        self.ensure_minimum();
    }

    async fn close_process(entry: &LeaseEntry) {
        if let Err(e) = entry.process.close().await {
            warn!(lease_id = %entry.lease.id, error = %e, "Failed to close browser process");
        }
    }

    fn publish_metrics(&self) {
        let status = self.status();
        gauge!("pool_leases_total").set(status.size as f64);
        gauge!("pool_leases_idle").set(status.idle as f64);
        gauge!("pool_leases_leased").set(status.leased as f64);
        gauge!("pool_acquire_pending").set(status.pending as f64);
    }
}

/// 租约守卫
///
/// 显式调用 [`LeaseGuard::release`] 或 [`LeaseGuard::destroy`] 结束租约；
/// 未结束就被释放时（出错、超时取消、panic）在后台归还，
/// 调用过 [`LeaseGuard::discard_on_drop`] 的则在后台销毁
pub struct LeaseGuard {
    pool: BrowserPool,
    lease: BrowserLease,
    settled: bool,
    discard_on_drop: bool,
}

impl LeaseGuard {
    pub async fn release(mut self) -> bool {
        self.settled = true;
        self.pool.release(&self.lease.id).await
    }

    pub async fn destroy(mut self) -> bool {
        self.settled = true;
        self.pool.destroy(&self.lease.id).await
    }

    /// 守卫未结束就被释放时销毁浏览器而不是归还
    ///
    /// 用于浏览器状态可能被半途中断的操作污染的场景
    pub fn discard_on_drop(&mut self) {
        self.discard_on_drop = true;
    }
}

impl Deref for LeaseGuard {
    type Target = BrowserLease;

    fn deref(&self) -> &Self::Target {
        &self.lease
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let pool = self.pool.clone();
        let id = self.lease.id.clone();
        let discard = self.discard_on_drop;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if discard {
                        pool.destroy(&id).await;
                    } else {
                        pool.release(&id).await;
                    }
                });
            }
            Err(_) => {
                warn!(lease_id = %id, "Lease dropped outside a runtime, it stays leased until destroyed");
            }
        }
    }
}

#[cfg(test)]
#[path = "browser_pool_test.rs"]
mod tests;
