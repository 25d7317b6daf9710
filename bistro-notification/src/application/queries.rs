/// 通知快照查询
#[derive(Debug, Clone, Default)]
pub struct NotificationSnapshotQuery {
    /// 只返回未读通知
    pub unread_only: bool,
    /// 按分类过滤
    pub notification_type: Option<String>,
}
