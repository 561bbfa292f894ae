// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::pool::launcher::{BrowserLauncher, BrowserProcess, LaunchedBrowser, PoolError};
use crate::pool::lease::LeaseId;
use crate::utils::port_sniffer::{PortReservation, PortSniffer};
use crate::utils::retry_policy::{RetryPolicy, Retryable};

/// Chromium 启动选项
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// 是否无头运行
    pub headless: bool,
    /// 是否禁用沙箱（容器内运行时需要）
    pub no_sandbox: bool,
    /// Chrome 可执行文件路径，为空时自动探测
    pub chrome_executable: Option<PathBuf>,
    /// 额外的启动参数
    pub extra_args: Vec<String>,
    /// 调试端口嗅探的起始端口，0 表示由操作系统分配
    pub base_debug_port: u16,
    /// CDP 请求超时
    pub request_timeout: Duration,
    /// 控制端点发现的最大尝试次数
    pub discovery_attempts: u32,
}

impl Default for ChromiumOptions {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            chrome_executable: None,
            extra_args: Vec::new(),
            base_debug_port: 9222,
            request_timeout: Duration::from_secs(30),
            discovery_attempts: 5,
        }
    }
}

const BUILTIN_ARGS: [&str; 3] = [
    "--window-size=1920,1080",
    "--disable-gpu",
    "--disable-dev-shm-usage",
];

/// 基于 chromiumoxide 的浏览器启动器
///
/// 每个租约一个独立的 Chrome 进程，独立的调试端口和用户数据目录
pub struct ChromiumLauncher {
    options: ChromiumOptions,
    ports: PortSniffer,
    client: reqwest::Client,
    discovery: RetryPolicy,
}

impl ChromiumLauncher {
    pub fn new(options: ChromiumOptions) -> Self {
        let discovery = RetryPolicy::with_attempts(options.discovery_attempts, Duration::from_millis(250));
        Self {
            options,
            ports: PortSniffer::new(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            discovery,
        }
    }

    fn browser_config(&self, port: u16, user_data_dir: &Path) -> Result<BrowserConfig, PoolError> {
        let mut builder = BrowserConfig::builder()
            .port(port)
            .user_data_dir(user_data_dir)
            .request_timeout(self.options.request_timeout);

        if !self.options.headless {
            builder = builder.with_head();
        }
        if self.options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        for arg in self.launch_args() {
            builder = builder.arg(arg);
        }

        builder.build().map_err(PoolError::Provision)
    }

    /// 内置启动参数加上配置的额外参数，重复项只保留一次
    fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = BUILTIN_ARGS.iter().map(|arg| arg.to_string()).collect();
        for arg in &self.options.extra_args {
            if !args.contains(arg) {
                args.push(arg.clone());
            }
        }
        args
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, lease_id: &LeaseId) -> Result<LaunchedBrowser, PoolError> {
        let reservation = self
            .ports
            .reserve(self.options.base_debug_port)
            .map_err(|e| PoolError::Provision(e.to_string()))?;
        let port = reservation.port();
        let user_data_dir = std::env::temp_dir().join(format!("scanrs-{}", lease_id));

        let config = self.browser_config(port, &user_data_dir)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PoolError::Provision(format!("failed to launch chrome: {}", e)))?;

        let connected = Arc::new(AtomicBool::new(true));
        let (disconnect_tx, disconnect_rx) = oneshot::channel();
        {
            let connected = connected.clone();
            let lease_id = lease_id.clone();
            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!(lease_id = %lease_id, error = %e, "CDP handler error");
                    }
                }
                connected.store(false, Ordering::SeqCst);
                debug!(lease_id = %lease_id, "CDP connection closed");
                let _ = disconnect_tx.send(());
            });
        }

        let base_url = format!("http://127.0.0.1:{}", port);
        let control_url = match discover_control_url(&self.client, &base_url, &self.discovery).await {
            Ok(url) => url,
            Err(e) => {
                warn!(lease_id = %lease_id, port, error = %e, "Control endpoint discovery failed, killing browser");
                let _ = browser.kill().await;
                let _ = tokio::fs::remove_dir_all(&user_data_dir).await;
                return Err(e);
            }
        };

        info!(lease_id = %lease_id, port, "Chrome launched");
        Ok(LaunchedBrowser {
            process: Box::new(ChromiumProcess {
                browser: Mutex::new(Some(browser)),
                connected,
                user_data_dir,
                _port: reservation,
            }),
            control_url,
            debug_port: port,
            disconnected: disconnect_rx,
        })
    }
}

struct ChromiumProcess {
    browser: Mutex<Option<Browser>>,
    connected: Arc<AtomicBool>,
    user_data_dir: PathBuf,
    _port: PortReservation,
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), PoolError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        self.connected.store(false, Ordering::SeqCst);

        if let Err(e) = browser.close().await {
            debug!(error = %e, "Graceful close failed, killing chrome");
            let _ = browser.kill().await;
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Failed to reap chrome process");
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            debug!(path = %self.user_data_dir.display(), error = %e, "Failed to remove user data dir");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

#[derive(Debug)]
struct DiscoveryError(String);

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Retryable for DiscoveryError {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// 通过调试端口发现浏览器的远程控制地址
///
/// 请求 `{base_url}/json/version` 并读取 `webSocketDebuggerUrl`，
/// 进程刚启动时端点可能尚未就绪，按策略重试
///
/// # 参数
///
/// * `client` - HTTP 客户端
/// * `base_url` - 调试端口地址，如 `http://127.0.0.1:9222`
/// * `policy` - 重试策略
///
/// # 返回值
///
/// * `Ok(String)` - 远程控制地址
/// * `Err(PoolError::Provision)` - 尝试次数用尽
pub async fn discover_control_url(
    client: &reqwest::Client,
    base_url: &str,
    policy: &RetryPolicy,
) -> Result<String, PoolError> {
    let endpoint = format!("{}/json/version", base_url.trim_end_matches('/'));

    policy
        .execute("discover_control_url", || {
            let client = client.clone();
            let endpoint = endpoint.clone();
            async move {
                let response = client
                    .get(&endpoint)
                    .send()
                    .await
                    .map_err(|e| DiscoveryError(format!("request to {} failed: {}", endpoint, e)))?;
                if !response.status().is_success() {
                    return Err(DiscoveryError(format!(
                        "{} returned {}",
                        endpoint,
                        response.status()
                    )));
                }
                let info: VersionInfo = response
                    .json()
                    .await
                    .map_err(|e| DiscoveryError(format!("invalid version payload: {}", e)))?;
                Ok(info.web_socket_debugger_url)
            }
        })
        .await
        .map_err(|e| PoolError::Provision(format!("control endpoint discovery failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_policy(attempts: u32) -> RetryPolicy {
        let mut policy = RetryPolicy::with_attempts(attempts, Duration::from_millis(5));
        policy.enable_jitter = false;
        policy
    }

    #[test]
    fn test_launch_args_skip_builtin_duplicates() {
        let launcher = ChromiumLauncher::new(ChromiumOptions {
            extra_args: vec![
                "--disable-gpu".to_string(),
                "--lang=en-US".to_string(),
                "--lang=en-US".to_string(),
            ],
            ..ChromiumOptions::default()
        });

        let args = launcher.launch_args();

        assert_eq!(args.iter().filter(|arg| *arg == "--disable-gpu").count(), 1);
        assert_eq!(args.iter().filter(|arg| *arg == "--lang=en-US").count(), 1);
        assert_eq!(args.len(), BUILTIN_ARGS.len() + 1);
    }

    #[tokio::test]
    async fn test_discover_control_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "HeadlessChrome/120.0.0.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
            })))
            .mount(&server)
            .await;

        let url = discover_control_url(&reqwest::Client::new(), &server.uri(), &quick_policy(1))
            .await
            .unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn test_discover_retries_until_endpoint_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "webSocketDebuggerUrl": "ws://127.0.0.1:9223/devtools/browser/def"
            })))
            .mount(&server)
            .await;

        let url = discover_control_url(&reqwest::Client::new(), &server.uri(), &quick_policy(3))
            .await
            .unwrap();
        assert!(url.ends_with("/def"));
    }

    #[tokio::test]
    async fn test_discover_gives_up_with_provision_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(2)
            .mount(&server)
            .await;

        let result = discover_control_url(&reqwest::Client::new(), &server.uri(), &quick_policy(2)).await;
        assert!(matches!(result, Err(PoolError::Provision(_))));
    }
}
