use crate::domain::model::ConversationFilter;

/// 会话列表查询
#[derive(Debug, Clone, Default)]
pub struct ConversationListQuery {
    pub filter: ConversationFilter,
}

/// 会话消息查询
#[derive(Debug, Clone)]
pub struct ConversationMessagesQuery {
    pub conversation_id: String,
}
