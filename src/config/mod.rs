//! Bistro 同步核心配置模块
//!
//! 该模块提供了完整的配置管理功能，包括：
//! - 配置文件加载和解析（单文件或目录合并）
//! - 环境特定配置覆盖
//! - 后端、日志、各同步服务配置定义

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

mod manager;
pub use manager::ConfigManager;

/// 后端 REST 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 后端 API 基础地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 请求超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// User-Agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            user_agent: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 优先）
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    #[serde(default)]
    pub with_file: bool,
    #[serde(default)]
    pub with_line_number: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: false,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// 通知同步服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationServiceConfig {
    /// 每页条数
    #[serde(default)]
    pub page_limit: Option<u32>,
    /// 管理员拉取时的受众过滤（服务端第一道防线）
    #[serde(default)]
    pub audience_target: Option<String>,
    /// 变更失败时是否回滚乐观更新
    #[serde(default)]
    pub rollback_on_failure: Option<bool>,
}

/// 会话同步服务配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConversationServiceConfig {
    /// 变更失败时是否回滚乐观更新
    #[serde(default)]
    pub rollback_on_failure: Option<bool>,
    /// 附件大小上限（字节）
    #[serde(default)]
    pub max_attachment_bytes: Option<u64>,
    /// 非当前打开会话收到新消息时是否立即累加未读数
    #[serde(default)]
    pub count_incoming_as_unread: Option<bool>,
}

/// 服务配置集合
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub notification: Option<NotificationServiceConfig>,
    #[serde(default)]
    pub conversation: Option<ConversationServiceConfig>,
}

/// Bistro 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BistroAppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

impl BistroAppConfig {
    /// 获取通知同步服务配置
    pub fn notification_service(&self) -> NotificationServiceConfig {
        self.services.notification.clone().unwrap_or_default()
    }

    /// 获取会话同步服务配置
    pub fn conversation_service(&self) -> ConversationServiceConfig {
        self.services.conversation.clone().unwrap_or_default()
    }

    fn ensure_defaults(&mut self) {
        if self.backend.base_url.trim().is_empty() {
            self.backend.base_url = default_base_url();
        }
        if self.backend.timeout_ms == 0 {
            self.backend.timeout_ms = default_timeout_ms();
        }
    }
}

/// 加载配置
///
/// 配置按会话构建并由组合根持有，不使用进程级全局实例。
pub fn load_config(path: Option<&str>) -> BistroAppConfig {
    let candidates: Vec<PathBuf> = match path {
        Some(p) => vec![PathBuf::from(p)],
        None => vec![PathBuf::from("config"), PathBuf::from("config.toml")],
    };

    let mut cfg = load_with_fallback(&candidates);
    if let Err(e) = ConfigManager::load_environment_config(&mut cfg) {
        warn!("failed to load environment config: {}", e);
    }
    cfg
}

/// 使用备选方案加载配置
fn load_with_fallback(candidates: &[PathBuf]) -> BistroAppConfig {
    for path in candidates {
        match load_config_from_source(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    BistroAppConfig::default()
}

/// 从源加载配置
pub fn load_config_from_source(path: &Path) -> Result<BistroAppConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    let metadata = path
        .metadata()
        .with_context(|| format!("unable to read metadata for {}", path.display()))?;

    let mut cfg = if metadata.is_dir() {
        load_config_from_directory(path)?
    } else {
        load_config_from_file(path)?
    };
    cfg.ensure_defaults();
    Ok(cfg)
}

fn load_config_from_file(path: &Path) -> Result<BistroAppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config format: {}", path.display()))
}

/// 从目录加载配置：base.toml + shared/ + services/ + overrides/
fn load_config_from_directory(path: &Path) -> Result<BistroAppConfig> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;

    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("shared"))?;
    merge_directory(&mut merged, &path.join("services"))?;
    merge_directory(&mut merged, &path.join("overrides"))?;

    let cfg: BistroAppConfig = merged
        .try_into()
        .with_context(|| format!("invalid configuration after merging {}", path.display()))?;

    Ok(cfg)
}

fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

pub(crate) fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 递归合并：表按键合并，其余值直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}
