//! 受众过滤
//!
//! 每次拉取后无条件执行，即使后端已按 target 过滤。

use bistro_core::metrics::SYNC_METRICS;
use tracing::warn;

use crate::domain::model::Notification;

/// 移除所有 `CUSTOMER` 受众记录，保持原有顺序，不去重
pub fn filter_visible(records: Vec<Notification>) -> Vec<Notification> {
    let before = records.len();
    let visible: Vec<Notification> = records
        .into_iter()
        .filter(|record| {
            if record.target.is_customer() {
                warn!(
                    notification_id = %record.id,
                    "Backend returned a customer notification, dropping it"
                );
                SYNC_METRICS.filter_violation_total.inc();
                false
            } else {
                true
            }
        })
        .collect();

    if visible.len() != before {
        warn!(
            dropped = before - visible.len(),
            "Customer notifications removed from back-office view"
        );
    }
    visible
}
