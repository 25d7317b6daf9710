use std::env;

use anyhow::{Result, bail};
use bistro_core::config::{BackendConfig, BistroAppConfig};

use crate::domain::model::NotificationDomainConfig;

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub backend: BackendConfig,
    pub page_limit: u32,
    pub audience_target: String,
    pub rollback_on_failure: bool,
}

impl NotificationConfig {
    /// 从应用配置加载，环境变量优先
    pub fn from_app_config(app: &BistroAppConfig) -> Result<Self> {
        let service_config = app.notification_service();

        let mut backend = app.backend.clone();
        if let Ok(url) = env::var("BISTRO_BACKEND_URL") {
            if !url.trim().is_empty() {
                backend.base_url = url;
            }
        }

        let page_limit = env::var("BISTRO_NOTIFICATION_PAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .or(service_config.page_limit)
            .unwrap_or(10);
        if page_limit == 0 {
            bail!("notification page_limit must be positive");
        }

        let audience_target = service_config
            .audience_target
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "USER".to_string());

        let rollback_on_failure = service_config.rollback_on_failure.unwrap_or(true);

        Ok(Self {
            backend,
            page_limit,
            audience_target,
            rollback_on_failure,
        })
    }

    pub fn domain_config(&self) -> NotificationDomainConfig {
        NotificationDomainConfig {
            page_limit: self.page_limit,
            audience_target: self.audience_target.clone(),
            rollback_on_failure: self.rollback_on_failure,
        }
    }
}
