// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 不依赖 Chrome 的浏览器启动器，供单元测试使用

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::pool::launcher::{BrowserLauncher, BrowserProcess, LaunchedBrowser, PoolError};
use crate::pool::lease::LeaseId;

#[derive(Default)]
pub(crate) struct FakeProcessState {
    connected: AtomicBool,
    closed: AtomicBool,
}

struct FakeProcess(Arc<FakeProcessState>);

#[async_trait]
impl BrowserProcess for FakeProcess {
    fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst) && !self.0.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), PoolError> {
        self.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLauncher {
    launched: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    control_url: Mutex<Option<String>>,
    processes: Mutex<HashMap<LeaseId, Arc<FakeProcessState>>>,
    disconnects: Mutex<HashMap<LeaseId, oneshot::Sender<()>>>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// 所有后续启动的浏览器都使用该控制地址
    pub(crate) fn set_control_url(&self, url: String) {
        *self.control_url.lock() = Some(url);
    }

    pub(crate) fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.processes
            .lock()
            .values()
            .filter(|state| state.closed.load(Ordering::SeqCst))
            .count()
    }

    pub(crate) fn is_closed(&self, id: &LeaseId) -> bool {
        self.processes
            .lock()
            .get(id)
            .is_some_and(|state| state.closed.load(Ordering::SeqCst))
    }

    /// 模拟进程崩溃并通知浏览器池
    pub(crate) fn crash(&self, id: &LeaseId) {
        if let Some(state) = self.processes.lock().get(id) {
            state.connected.store(false, Ordering::SeqCst);
        }
        if let Some(tx) = self.disconnects.lock().remove(id) {
            let _ = tx.send(());
        }
    }

    /// 进程失去连接，但浏览器池没有收到通知
    pub(crate) fn go_stale(&self, id: &LeaseId) {
        if let Some(state) = self.processes.lock().get(id) {
            state.connected.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, lease_id: &LeaseId) -> Result<LaunchedBrowser, PoolError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PoolError::Provision("chrome binary not found".to_string()));
        }

        let n = self.launched.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(FakeProcessState::default());
        state.connected.store(true, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        self.processes.lock().insert(lease_id.clone(), state.clone());
        self.disconnects.lock().insert(lease_id.clone(), tx);

        let debug_port = 9222 + n as u16;
        let control_url = self
            .control_url
            .lock()
            .clone()
            .unwrap_or_else(|| format!("ws://127.0.0.1:{}/devtools/browser/{}", debug_port, lease_id));
        Ok(LaunchedBrowser {
            process: Box::new(FakeProcess(state)),
            control_url,
            debug_port,
            disconnected: rx,
        })
    }
}
