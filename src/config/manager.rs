//! 配置管理器 - 负责处理不同环境下的配置选择和覆盖
//!
//! - 根据 BISTRO_ENV 选择环境
//! - 加载 config/environments/{env}.toml 并覆盖基础配置

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::Value;

use super::{BistroAppConfig, ConversationServiceConfig, NotificationServiceConfig};

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取当前环境名称，未设置时默认为 "development"
    pub fn get_environment() -> String {
        env::var("BISTRO_ENV").unwrap_or_else(|_| "development".to_string())
    }

    /// 根据环境加载特定配置
    pub fn load_environment_config(base_config: &mut BistroAppConfig) -> Result<()> {
        let env = Self::get_environment();
        let env_config_path = format!("config/environments/{}.toml", env);

        if Path::new(&env_config_path).exists() {
            let content = fs::read_to_string(&env_config_path)
                .with_context(|| {
                    format!("unable to read environment config: {}", env_config_path)
                })?;
            let overlay: Value = toml::from_str(&content)
                .with_context(|| format!("invalid environment config: {}", env_config_path))?;
            Self::apply_overlay(base_config, &overlay);
        }

        Ok(())
    }

    /// 将环境配置逐字段覆盖到基础配置中（只覆盖出现的字段）
    pub fn apply_overlay(config: &mut BistroAppConfig, overlay: &Value) {
        if let Some(backend) = overlay.get("backend") {
            if let Some(base_url) = backend.get("base_url").and_then(|v| v.as_str()) {
                config.backend.base_url = base_url.to_string();
            }
            if let Some(timeout_ms) = backend.get("timeout_ms").and_then(|v| v.as_integer()) {
                if timeout_ms > 0 {
                    config.backend.timeout_ms = timeout_ms as u64;
                }
            }
            if let Some(user_agent) = backend.get("user_agent").and_then(|v| v.as_str()) {
                config.backend.user_agent = Some(user_agent.to_string());
            }
        }

        if let Some(logging) = overlay.get("logging") {
            if let Some(level) = logging.get("level").and_then(|v| v.as_str()) {
                config.logging.level = level.to_string();
            }
            if let Some(flag) = logging.get("with_target").and_then(|v| v.as_bool()) {
                config.logging.with_target = flag;
            }
            if let Some(flag) = logging.get("with_thread_ids").and_then(|v| v.as_bool()) {
                config.logging.with_thread_ids = flag;
            }
            if let Some(flag) = logging.get("with_file").and_then(|v| v.as_bool()) {
                config.logging.with_file = flag;
            }
            if let Some(flag) = logging.get("with_line_number").and_then(|v| v.as_bool()) {
                config.logging.with_line_number = flag;
            }
        }

        if let Some(services) = overlay.get("services") {
            if let Some(notification) = services.get("notification") {
                let current = config.services.notification.get_or_insert_with(Default::default);
                Self::merge_notification(current, notification);
            }
            if let Some(conversation) = services.get("conversation") {
                let current = config.services.conversation.get_or_insert_with(Default::default);
                Self::merge_conversation(current, conversation);
            }
        }
    }

    fn merge_notification(current: &mut NotificationServiceConfig, value: &Value) {
        if let Some(limit) = value.get("page_limit").and_then(|v| v.as_integer()) {
            if limit > 0 {
                current.page_limit = Some(limit as u32);
            }
        }
        if let Some(target) = value.get("audience_target").and_then(|v| v.as_str()) {
            current.audience_target = Some(target.to_string());
        }
        if let Some(flag) = value.get("rollback_on_failure").and_then(|v| v.as_bool()) {
            current.rollback_on_failure = Some(flag);
        }
    }

    fn merge_conversation(current: &mut ConversationServiceConfig, value: &Value) {
        if let Some(flag) = value.get("rollback_on_failure").and_then(|v| v.as_bool()) {
            current.rollback_on_failure = Some(flag);
        }
        if let Some(bytes) = value.get("max_attachment_bytes").and_then(|v| v.as_integer()) {
            if bytes > 0 {
                current.max_attachment_bytes = Some(bytes as u64);
            }
        }
        if let Some(flag) = value.get("count_incoming_as_unread").and_then(|v| v.as_bool()) {
            current.count_incoming_as_unread = Some(flag);
        }
    }
}
