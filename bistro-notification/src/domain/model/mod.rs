use std::fmt;

use bistro_core::{PageCursor, Replicated, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知受众标签
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationTarget {
    /// 后台用户
    User,
    /// 顾客端（后台视图中永远不可见）
    Customer,
    Other(String),
}

impl NotificationTarget {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationTarget::User => "USER",
            NotificationTarget::Customer => "CUSTOMER",
            NotificationTarget::Other(value) => value.as_str(),
        }
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, NotificationTarget::Customer)
    }
}

impl From<String> for NotificationTarget {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "USER" => NotificationTarget::User,
            "CUSTOMER" => NotificationTarget::Customer,
            _ => NotificationTarget::Other(value),
        }
    }
}

impl From<NotificationTarget> for String {
    fn from(value: NotificationTarget) -> Self {
        value.as_str().to_string()
    }
}

impl Default for NotificationTarget {
    fn default() -> Self {
        NotificationTarget::Other(String::new())
    }
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 通知记录（由服务端创建，客户端不生成 id）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub target: NotificationTarget,
    /// 分类标签（用于图标/颜色选择）
    #[serde(rename = "type", default)]
    pub notification_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// 业务负载，核心不解析
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Replicated for Notification {
    fn replica_id(&self) -> &str {
        &self.id
    }
}

/// 通知统计（派生值，始终满足 unread + read == total）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: u64,
    pub unread: u64,
    pub read: u64,
}

impl NotificationStats {
    /// 全量扫描计算（仅在整体替换时使用）
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Notification>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.on_insert(record.is_read);
        }
        stats
    }

    pub fn on_insert(&mut self, is_read: bool) {
        self.total += 1;
        if !is_read {
            self.unread += 1;
        }
        self.normalize();
    }

    pub fn on_remove(&mut self, was_read: bool) {
        self.total = self.total.saturating_sub(1);
        if !was_read {
            self.unread = self.unread.saturating_sub(1);
        }
        self.normalize();
    }

    /// 已存在记录的已读状态变化
    pub fn on_read_changed(&mut self, was_read: bool, is_read: bool) {
        match (was_read, is_read) {
            (false, true) => self.unread = self.unread.saturating_sub(1),
            (true, false) => self.unread += 1,
            _ => {}
        }
        self.normalize();
    }

    pub fn on_all_read(&mut self) {
        self.unread = 0;
        self.normalize();
    }

    fn normalize(&mut self) {
        self.unread = self.unread.min(self.total);
        self.read = self.total - self.unread;
    }
}

/// 拉取参数
#[derive(Clone, Debug)]
pub struct NotificationQuery {
    pub user_id: String,
    pub role: Role,
    pub page: u32,
    pub limit: u32,
    /// 管理员请求携带的受众过滤
    pub target: String,
}

/// 拉取结果：管理员为分页结果，其他角色为完整列表
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Paged {
        items: Vec<Notification>,
        meta: PageCursor,
    },
    Unpaged {
        items: Vec<Notification>,
    },
}

impl FetchOutcome {
    pub fn items(&self) -> &[Notification] {
        match self {
            FetchOutcome::Paged { items, .. } | FetchOutcome::Unpaged { items } => items,
        }
    }

    /// 拆分为记录与游标，非分页结果视为合成单页
    pub fn into_page(self) -> (Vec<Notification>, PageCursor) {
        match self {
            FetchOutcome::Paged { items, meta } => (items, meta),
            FetchOutcome::Unpaged { items } => {
                let cursor = PageCursor::single(items.len());
                (items, cursor)
            }
        }
    }
}

/// 同步状态标志（供 UI 渲染加载/错误态）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// 首页加载/刷新进行中
    pub loading: bool,
    /// 后续页加载进行中
    pub loading_more: bool,
    /// 最近一次失败（拉取或变更）
    pub last_error: Option<String>,
    /// 已乐观应用、等待后端确认的变更数
    pub pending_mutations: usize,
}

/// 通知只读快照
#[derive(Clone, Debug, Serialize)]
pub struct NotificationSnapshot {
    pub items: Vec<Notification>,
    pub stats: NotificationStats,
    pub cursor: PageCursor,
    pub has_more_pages: bool,
    pub status: SyncStatus,
}

/// 拉取结果报告
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchReport {
    /// 按发起顺序应用了若干页
    Applied { pages: usize },
    /// 结果已返回，等待更早发起的请求后再应用
    Queued,
    /// 结果属于已失效的会话/刷新，被丢弃
    Discarded,
    /// 无需拉取（没有更多页或非分页角色）
    Skipped,
}

/// 通知领域配置值对象
#[derive(Clone, Debug)]
pub struct NotificationDomainConfig {
    pub page_limit: u32,
    pub audience_target: String,
    pub rollback_on_failure: bool,
}

impl Default for NotificationDomainConfig {
    fn default() -> Self {
        Self {
            page_limit: 10,
            audience_target: "USER".to_string(),
            rollback_on_failure: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_deserializes_backend_shape() {
        let raw = r#"{
            "id": "n1",
            "target": "USER",
            "type": "ORDER",
            "title": "New order",
            "message": "Table 4 placed an order",
            "is_read": false,
            "created_at": "2024-03-01T12:00:00Z",
            "data": {"orderId": "o-9"}
        }"#;
        let n: Notification = serde_json::from_str(raw).unwrap();
        assert_eq!(n.target, NotificationTarget::User);
        assert_eq!(n.notification_type, "ORDER");
        assert_eq!(n.data["orderId"], "o-9");
    }

    #[test]
    fn test_target_parsing_is_case_insensitive() {
        assert_eq!(
            NotificationTarget::from("customer".to_string()),
            NotificationTarget::Customer
        );
        assert_eq!(
            NotificationTarget::from("KITCHEN".to_string()),
            NotificationTarget::Other("KITCHEN".to_string())
        );
    }

    #[test]
    fn test_stats_never_go_negative() {
        let mut stats = NotificationStats::default();
        stats.on_remove(false);
        stats.on_read_changed(false, true);
        assert_eq!(stats, NotificationStats::default());

        stats.on_insert(true);
        stats.on_read_changed(true, false);
        stats.on_read_changed(true, false);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.unread, 1);
        assert_eq!(stats.read, 0);
    }

    #[test]
    fn test_unpaged_outcome_becomes_single_page() {
        let outcome = FetchOutcome::Unpaged { items: vec![] };
        let (items, cursor) = outcome.into_page();
        assert!(items.is_empty());
        assert_eq!(cursor.page, 1);
        assert!(!cursor.has_more_pages());
    }
}
