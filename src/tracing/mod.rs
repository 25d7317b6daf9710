//! # 日志初始化模块
//!
//! 为同步服务及其命令行入口提供统一的 tracing 日志初始化。

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// 优先使用环境变量 `RUST_LOG`，否则使用配置中的日志级别。
/// 重复初始化（例如测试中）会被忽略。
///
/// # 示例
/// ```rust,ignore
/// use bistro_core::config::LoggingConfig;
///
/// init_tracing_from_config(None);
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     with_target: true,
///     ..LoggingConfig::default()
/// };
/// init_tracing_from_config(Some(&config));
/// ```
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(config.level.as_str()),
    };

    let result = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter)
        .try_init();

    if result.is_ok() {
        info!(level = %config.level, "Logging initialized");
    }
}

/// 初始化指定服务的日志，并记录服务名
pub fn init_tracing(service_name: &str, logging_config: Option<&LoggingConfig>) {
    init_tracing_from_config(logging_config);
    info!(service_name = %service_name, "Tracing initialized");
}
