use std::env;

use anyhow::{Result, bail};
use bistro_core::config::{BackendConfig, BistroAppConfig};

use crate::domain::model::ConversationDomainConfig;

const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub backend: BackendConfig,
    pub rollback_on_failure: bool,
    pub max_attachment_bytes: u64,
    pub count_incoming_as_unread: bool,
}

impl ConversationConfig {
    /// 从应用配置加载，环境变量优先
    pub fn from_app_config(app: &BistroAppConfig) -> Result<Self> {
        let service_config = app.conversation_service();

        let mut backend = app.backend.clone();
        if let Ok(url) = env::var("BISTRO_BACKEND_URL") {
            if !url.trim().is_empty() {
                backend.base_url = url;
            }
        }

        let max_attachment_bytes = env::var("BISTRO_MAX_ATTACHMENT_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .or(service_config.max_attachment_bytes)
            .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES);
        if max_attachment_bytes == 0 {
            bail!("conversation max_attachment_bytes must be positive");
        }

        Ok(Self {
            backend,
            rollback_on_failure: service_config.rollback_on_failure.unwrap_or(true),
            max_attachment_bytes,
            count_incoming_as_unread: service_config.count_incoming_as_unread.unwrap_or(true),
        })
    }

    pub fn domain_config(&self) -> ConversationDomainConfig {
        ConversationDomainConfig {
            rollback_on_failure: self.rollback_on_failure,
            max_attachment_bytes: self.max_attachment_bytes,
            count_incoming_as_unread: self.count_incoming_as_unread,
        }
    }
}
