//! 分页拉取器
//!
//! 只负责一次网络调用与受众过滤，不读写本地副本，不做重试。

use std::sync::Arc;

use bistro_core::metrics::SYNC_METRICS;
use bistro_core::{Result, SessionIdentity};
use tracing::{debug, warn};

use crate::domain::model::{FetchOutcome, NotificationDomainConfig, NotificationQuery};
use crate::domain::repository::NotificationGateway;
use crate::domain::service::visibility::filter_visible;

pub struct PaginatedFetcher {
    gateway: Arc<dyn NotificationGateway>,
    limit: u32,
    target: String,
}

impl PaginatedFetcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>, config: &NotificationDomainConfig) -> Self {
        Self {
            gateway,
            limit: config.page_limit.max(1),
            target: config.audience_target.clone(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// 拉取一页（非管理员忽略 page，返回完整列表）
    pub async fn fetch_page(&self, identity: &SessionIdentity, page: u32) -> Result<FetchOutcome> {
        let query = NotificationQuery {
            user_id: identity.user_id.clone(),
            role: identity.role.clone(),
            page: page.max(1),
            limit: self.limit,
            target: self.target.clone(),
        };
        debug!(
            user_id = %query.user_id,
            role = %query.role,
            page = query.page,
            "Fetching notifications"
        );

        let outcome = match self.gateway.fetch_page(&query).await {
            Ok(outcome) => outcome,
            Err(err) => {
                SYNC_METRICS.record_fetch("notification", false);
                warn!(page = query.page, error = %err, "Notification fetch failed");
                return Err(err);
            }
        };
        SYNC_METRICS.record_fetch("notification", true);

        Ok(match outcome {
            FetchOutcome::Paged { items, meta } => FetchOutcome::Paged {
                items: filter_visible(items),
                meta,
            },
            FetchOutcome::Unpaged { items } => FetchOutcome::Unpaged {
                items: filter_visible(items),
            },
        })
    }
}
