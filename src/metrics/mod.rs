//! # Prometheus 指标收集模块
//!
//! 为通知、会话同步提供统一的 Prometheus 指标收集能力。

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// 全局指标注册表
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// 全局同步指标实例
pub static SYNC_METRICS: Lazy<SyncMetrics> = Lazy::new(SyncMetrics::new);

/// 同步核心指标
pub struct SyncMetrics {
    /// 拉取次数（entity, outcome）
    pub fetch_total: IntCounterVec,
    /// 变更次数（entity, kind, outcome）
    pub mutation_total: IntCounterVec,
    /// 乐观变更回滚次数（entity, kind）
    pub rollback_total: IntCounterVec,
    /// 被丢弃的过期拉取结果（entity）
    pub stale_fetch_dropped_total: IntCounterVec,
    /// 可见性过滤拦截的记录数
    pub filter_violation_total: IntCounter,
}

impl SyncMetrics {
    pub fn new() -> Self {
        let fetch_total = IntCounterVec::new(
            Opts::new("sync_fetch_total", "Total number of fetches issued by the sync core"),
            &["entity", "outcome"],
        )
        .expect("Failed to create sync_fetch_total metric");

        let mutation_total = IntCounterVec::new(
            Opts::new(
                "sync_mutation_total",
                "Total number of optimistic mutations dispatched",
            ),
            &["entity", "kind", "outcome"],
        )
        .expect("Failed to create sync_mutation_total metric");

        let rollback_total = IntCounterVec::new(
            Opts::new(
                "sync_rollback_total",
                "Total number of optimistic mutations rolled back",
            ),
            &["entity", "kind"],
        )
        .expect("Failed to create sync_rollback_total metric");

        let stale_fetch_dropped_total = IntCounterVec::new(
            Opts::new(
                "sync_stale_fetch_dropped_total",
                "Total number of fetch results discarded as stale",
            ),
            &["entity"],
        )
        .expect("Failed to create sync_stale_fetch_dropped_total metric");

        let filter_violation_total = IntCounter::new(
            "sync_filter_violation_total",
            "Total number of customer-facing records removed by the visibility filter",
        )
        .expect("Failed to create sync_filter_violation_total metric");

        // 注册指标，忽略重复注册错误
        let _ = REGISTRY.register(Box::new(fetch_total.clone()));
        let _ = REGISTRY.register(Box::new(mutation_total.clone()));
        let _ = REGISTRY.register(Box::new(rollback_total.clone()));
        let _ = REGISTRY.register(Box::new(stale_fetch_dropped_total.clone()));
        let _ = REGISTRY.register(Box::new(filter_violation_total.clone()));

        Self {
            fetch_total,
            mutation_total,
            rollback_total,
            stale_fetch_dropped_total,
            filter_violation_total,
        }
    }

    pub fn record_fetch(&self, entity: &str, ok: bool) {
        self.fetch_total
            .with_label_values(&[entity, outcome(ok)])
            .inc();
    }

    pub fn record_mutation(&self, entity: &str, kind: &str, ok: bool) {
        self.mutation_total
            .with_label_values(&[entity, kind, outcome(ok)])
            .inc();
    }

    pub fn record_rollback(&self, entity: &str, kind: &str) {
        self.rollback_total.with_label_values(&[entity, kind]).inc();
    }

    pub fn record_stale_fetch(&self, entity: &str) {
        self.stale_fetch_dropped_total
            .with_label_values(&[entity])
            .inc();
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok { "success" } else { "failure" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = SYNC_METRICS
            .mutation_total
            .with_label_values(&["notification", "mark_read", "success"])
            .get();
        SYNC_METRICS.record_mutation("notification", "mark_read", true);
        let after = SYNC_METRICS
            .mutation_total
            .with_label_values(&["notification", "mark_read", "success"])
            .get();
        assert_eq!(after, before + 1);
    }
}
