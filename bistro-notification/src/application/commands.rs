/// 标记已读命令
#[derive(Debug, Clone)]
pub struct MarkReadCommand {
    pub notification_id: String,
}

/// 标记未读命令
#[derive(Debug, Clone)]
pub struct MarkUnreadCommand {
    pub notification_id: String,
}

/// 全部标记已读命令
#[derive(Debug, Clone, Default)]
pub struct MarkAllReadCommand;

/// 删除通知命令
#[derive(Debug, Clone)]
pub struct DeleteNotificationCommand {
    pub notification_id: String,
}

/// 批量删除命令
#[derive(Debug, Clone)]
pub struct DeleteMultipleCommand {
    pub notification_ids: Vec<String>,
}

/// 拉取命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadNotificationsCommand {
    /// 清空后加载第一页
    FirstPage,
    /// 下一页
    NextPage,
    /// 以第一页结果整体替换
    Refresh,
}
