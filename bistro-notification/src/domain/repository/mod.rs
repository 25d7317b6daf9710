use async_trait::async_trait;
use bistro_core::Result;

use crate::domain::model::{FetchOutcome, NotificationQuery};

/// 通知后端网关
///
/// 所有调用均可能失败；实现方只负责协议映射，不修改本地状态。
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// 管理员返回分页结果，其他角色返回完整列表
    async fn fetch_page(&self, query: &NotificationQuery) -> Result<FetchOutcome>;

    async fn mark_read(&self, id: &str) -> Result<()>;

    async fn mark_unread(&self, id: &str) -> Result<()>;

    async fn mark_all_read(&self, user_id: &str) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn delete_many(&self, ids: &[String]) -> Result<()>;
}
