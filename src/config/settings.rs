// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::domain::models::source::{Invocation, TargetSource};
use crate::domain::services::job_coordinator::CoordinatorPolicy;
use crate::domain::services::task_planner::TaskPlanner;
use crate::engines::listing_extractor::{ListingSelectors, SelectorExtractor};
use crate::pool::chromium::ChromiumOptions;
use crate::pool::config::PoolConfig;
use crate::utils::retry_policy::RetryPolicy;

/// 应用程序配置设置
///
/// 包含服务器、浏览器池、扫描协调、持久化、指标和数据源等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 浏览器池配置
    pub pool: PoolSettings,
    /// 扫描协调配置
    pub coordinator: CoordinatorSettings,
    /// 持久化配置
    pub persistence: PersistenceSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 数据源目录
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSettings>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 浏览器池配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    pub min: usize,
    pub max: usize,
    /// 空闲回收时长（秒）
    pub idle_ttl_secs: u64,
    /// 回收扫描间隔（秒）
    pub eviction_interval_secs: u64,
    pub test_on_borrow: bool,
    /// 借出等待上限（秒）
    pub acquire_timeout_secs: u64,
    /// 控制地址发现的最大尝试次数
    pub discovery_attempts: u32,
    /// 单次站点导航与提取的时限（秒）
    pub navigation_timeout_secs: u64,
    pub headless: bool,
    pub no_sandbox: bool,
    pub chrome_executable: Option<String>,
    #[serde(default)]
    pub launch_args: Vec<String>,
    pub base_debug_port: u16,
}

/// 扫描协调配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSettings {
    /// 任务结果写入的最大尝试次数
    pub outcome_max_attempts: u32,
    /// 扫描终态写入的最大尝试次数
    pub status_max_attempts: u32,
    /// 写入重试的初始退避（毫秒）
    pub retry_initial_backoff_ms: u64,
    /// 单个任务的执行时限（秒），为空时不限制
    pub task_timeout_secs: Option<u64>,
    /// 扫描结束后在内存中保留报告的时长（秒）
    pub job_retention_secs: u64,
    /// 关停时等待在途扫描结束的时限（秒）
    pub shutdown_grace_secs: u64,
}

/// 持久化后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceKind {
    /// 进程内存储
    Memory,
    /// 外部扫描记录服务
    Http,
}

/// 持久化配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSettings {
    pub kind: PersistenceKind,
    /// 扫描记录服务的基础地址，`kind = "http"` 时必填
    pub api_base_url: Option<String>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Prometheus 导出器监听地址
    pub listen_addr: String,
}

/// 数据源配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub id: String,
    pub invocation: Invocation,
    pub url_template: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// 结果页选择器，缺省时使用通用选择器
    #[serde(default)]
    pub selectors: ListingSelectors,
}

fn default_active() -> bool {
    true
}

fn default_sources() -> Vec<SourceSettings> {
    vec![
        SourceSettings {
            id: "smartbackgroundchecks".to_string(),
            invocation: Invocation::SmartBackgroundCheck,
            url_template:
                "https://www.smartbackgroundchecks.com/people/{firstName}-{lastName}/{city}/{lastName}"
                    .to_string(),
            active: true,
            selectors: ListingSelectors::default(),
        },
        SourceSettings {
            id: "peoplewhiz".to_string(),
            invocation: Invocation::PeopleWhiz,
            url_template:
                "https://www.peoplewhiz.com/hflow/results/{firstName}/~/{lastName}/~/{state}/~"
                    .to_string(),
            active: true,
            selectors: ListingSelectors {
                ready: Some("#resultsPage .results-nav".to_string()),
                ..ListingSelectors::default()
            },
        },
        SourceSettings {
            id: "whitepages".to_string(),
            invocation: Invocation::WhitePages,
            url_template: "https://www.whitepages.com/name/{firstName}-{lastName}/{city}-{state}"
                .to_string(),
            active: true,
            selectors: ListingSelectors::default(),
        },
    ]
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `SCANRS__` 前缀的环境变量
    ///
    /// # 返回值
    ///
    /// * `Ok(Settings)` - 成功加载并通过校验的配置
    /// * `Err(ConfigError)` - 配置加载或校验失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("SCANRS").separator("__"));

        Self::finish(builder)
    }

    /// 在内置默认值之上叠加一段 TOML 配置
    pub fn from_toml(overrides: &str) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(File::from_str(overrides, FileFormat::Toml));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Server
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Browser pool
            .set_default("pool.min", 2)?
            .set_default("pool.max", 10)?
            .set_default("pool.idle_ttl_secs", 600)?
            .set_default("pool.eviction_interval_secs", 30)?
            .set_default("pool.test_on_borrow", true)?
            .set_default("pool.acquire_timeout_secs", 120)?
            .set_default("pool.discovery_attempts", 5)?
            .set_default("pool.navigation_timeout_secs", 60)?
            .set_default("pool.headless", true)?
            .set_default("pool.no_sandbox", true)?
            .set_default("pool.base_debug_port", 9222)?
            // Coordinator
            .set_default("coordinator.outcome_max_attempts", 3)?
            .set_default("coordinator.status_max_attempts", 10)?
            .set_default("coordinator.retry_initial_backoff_ms", 500)?
            .set_default("coordinator.job_retention_secs", 3600)?
            .set_default("coordinator.shutdown_grace_secs", 30)?
            // Persistence
            .set_default("persistence.kind", "memory")?
            .set_default("persistence.request_timeout_secs", 10)?
            // Metrics
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 校验跨字段约束：池容量、写入重试预算、持久化地址、模板占位符和选择器语法
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool
            .pool_config()
            .validated()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        // The status write is the last word on a job and gets a strictly larger budget.
        if self.coordinator.status_max_attempts <= self.coordinator.outcome_max_attempts {
            return Err(ConfigError::Message(format!(
                "coordinator.status_max_attempts ({}) must exceed coordinator.outcome_max_attempts ({})",
                self.coordinator.status_max_attempts, self.coordinator.outcome_max_attempts
            )));
        }

        if self.persistence.kind == PersistenceKind::Http {
            let base = self.persistence.api_base_url.as_deref().ok_or_else(|| {
                ConfigError::Message(
                    "persistence.api_base_url is required when persistence.kind = \"http\""
                        .to_string(),
                )
            })?;
            url::Url::parse(base).map_err(|e| {
                ConfigError::Message(format!("persistence.api_base_url is invalid: {}", e))
            })?;
        }

        self.metrics_addr()?;

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::Message(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
            SelectorExtractor::new(&source.selectors).map_err(|e| {
                ConfigError::Message(format!("source {}: {}", source.id, e))
            })?;
        }

        self.planner()
            .validate_templates()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// 服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 指标导出器监听地址
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.metrics.listen_addr.parse().map_err(|e| {
            ConfigError::Message(format!(
                "metrics.listen_addr {} is invalid: {}",
                self.metrics.listen_addr, e
            ))
        })
    }

    /// 数据源目录
    pub fn target_sources(&self) -> Vec<TargetSource> {
        self.sources.iter().map(SourceSettings::target_source).collect()
    }

    /// 按数据源目录构建任务规划器
    pub fn planner(&self) -> TaskPlanner {
        TaskPlanner::new(self.target_sources())
    }
}

impl PoolSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min: self.min,
            max: self.max,
            idle_ttl: Duration::from_secs(self.idle_ttl_secs),
            eviction_interval: Duration::from_secs(self.eviction_interval_secs),
            test_on_borrow: self.test_on_borrow,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }

    pub fn chromium_options(&self) -> ChromiumOptions {
        ChromiumOptions {
            headless: self.headless,
            no_sandbox: self.no_sandbox,
            chrome_executable: self.chrome_executable.as_ref().map(PathBuf::from),
            extra_args: self.launch_args.clone(),
            base_debug_port: self.base_debug_port,
            discovery_attempts: self.discovery_attempts,
            ..ChromiumOptions::default()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl CoordinatorSettings {
    pub fn policy(&self) -> CoordinatorPolicy {
        let backoff = Duration::from_millis(self.retry_initial_backoff_ms);
        CoordinatorPolicy {
            outcome_retry: RetryPolicy::with_attempts(self.outcome_max_attempts, backoff),
            status_retry: RetryPolicy::with_attempts(self.status_max_attempts, backoff),
            task_timeout: self.task_timeout_secs.map(Duration::from_secs),
            job_retention: Duration::from_secs(self.job_retention_secs),
        }
    }

    /// 关停时等待在途扫描的时限
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl PersistenceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SourceSettings {
    pub fn target_source(&self) -> TargetSource {
        TargetSource {
            id: self.id.clone(),
            invocation: self.invocation,
            url_template: self.url_template.clone(),
            active: self.active,
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
