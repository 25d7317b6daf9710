use crate::domain::model::{Message, NewMessage};

/// 打开会话命令
#[derive(Debug, Clone)]
pub struct OpenConversationCommand {
    pub conversation_id: String,
}

/// 标记会话已读命令
#[derive(Debug, Clone)]
pub struct MarkConversationReadCommand {
    pub conversation_id: String,
}

/// 归档会话命令
#[derive(Debug, Clone)]
pub struct ArchiveConversationCommand {
    pub conversation_id: String,
}

/// 关闭会话命令
#[derive(Debug, Clone)]
pub struct CloseConversationCommand {
    pub conversation_id: String,
}

/// 发送消息命令
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub conversation_id: String,
    pub message: NewMessage,
}

/// 推送消息命令
#[derive(Debug, Clone)]
pub struct IngestMessageCommand {
    pub message: Message,
}
