use async_trait::async_trait;
use bistro_core::Result;

use crate::domain::model::{Conversation, Message, OutgoingMessage};

/// 会话后端网关
#[async_trait]
pub trait ConversationGateway: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// 发送消息，返回服务端创建的消息
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message>;

    async fn mark_read(&self, conversation_id: &str) -> Result<()>;

    async fn archive(&self, conversation_id: &str) -> Result<()>;

    async fn close(&self, conversation_id: &str) -> Result<()>;
}
