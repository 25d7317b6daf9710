//! 会话领域模型
//!
//! 会话状态机：
//! - ACTIVE: 进行中（服务端创建时的初始状态）
//! - ARCHIVED: 已归档（终态）
//! - CLOSED: 已关闭（终态）

use std::fmt;
use std::path::PathBuf;

use bistro_core::{Replicated, Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Active,
    Archived,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "ACTIVE",
            ConversationStatus::Archived => "ARCHIVED",
            ConversationStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "ACTIVE" => Ok(ConversationStatus::Active),
            "ARCHIVED" => Ok(ConversationStatus::Archived),
            "CLOSED" => Ok(ConversationStatus::Closed),
            _ => Err(format!("Invalid conversation status: {}", s)),
        }
    }

    /// 是否为终态（本核心内不支持重新打开）
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationStatus::Archived | ConversationStatus::Closed)
    }

    pub fn can_archive(&self) -> bool {
        matches!(self, ConversationStatus::Active)
    }

    pub fn can_close(&self) -> bool {
        matches!(self, ConversationStatus::Active)
    }

    /// 校验迁移，不合法时返回 `InvalidTransition`
    pub fn transition_to(&self, target: ConversationStatus) -> Result<ConversationStatus> {
        let allowed = match target {
            ConversationStatus::Archived => self.can_archive(),
            ConversationStatus::Closed => self.can_close(),
            ConversationStatus::Active => false,
        };
        if !allowed {
            return Err(SyncError::InvalidTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
        Ok(target)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 消息发送方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderType {
    /// 顾客
    Client,
    /// 后台人员
    Backoffice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Image => "IMAGE",
            MessageType::File => "FILE",
        }
    }
}

/// 会话记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(alias = "clientId")]
    pub client_id: String,
    pub status: ConversationStatus,
    #[serde(default, alias = "unreadCount")]
    pub unread_count: u32,
    #[serde(default, alias = "lastMessageAt")]
    pub last_message_at: Option<DateTime<Utc>>,
    /// 最近一条消息的预览文本
    #[serde(default, alias = "lastMessage")]
    pub last_message: Option<String>,
}

impl Replicated for Conversation {
    fn replica_id(&self) -> &str {
        &self.id
    }
}

/// 消息记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(alias = "conversationId")]
    pub conversation_id: String,
    #[serde(alias = "senderType")]
    pub sender_type: SenderType,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "messageType")]
    pub message_type: MessageType,
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, alias = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Message {
    /// 计入会话未读数的消息
    pub fn counts_as_unread(&self) -> bool {
        !self.is_read
    }

    /// 会话列表中展示的预览文本
    pub fn preview_text(&self) -> String {
        if !self.content.trim().is_empty() {
            return self.content.clone();
        }
        match (&self.file_name, self.message_type) {
            (Some(name), _) => name.clone(),
            (None, MessageType::Image) => "[image]".to_string(),
            (None, MessageType::File) => "[file]".to_string(),
            (None, MessageType::Text) => String::new(),
        }
    }
}

impl Replicated for Message {
    fn replica_id(&self) -> &str {
        &self.id
    }
}

/// 会话统计（由副本扫描得出）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationStats {
    pub total_conversations: u64,
    /// unread_count > 0 的会话数
    pub unread_conversations: u64,
    /// 已缓存的消息数
    pub total_messages: u64,
    /// 所有会话 unread_count 之和
    pub unread_messages: u64,
}

/// 发送新消息的输入
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: String,
    pub message_type: MessageType,
    /// 本地附件路径
    pub attachment: Option<PathBuf>,
}

impl NewMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }
}

/// 附件预览（UI 在发送前展示）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentPreview {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// 图片的 base64 data URL，其他类型为空
    pub data_url: Option<String>,
}

impl AttachmentPreview {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// 附件内容
#[derive(Clone)]
pub struct AttachmentPayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AttachmentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentPayload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// 发往网关的消息
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub conversation_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub attachment: Option<AttachmentPayload>,
}

/// 发送结果
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: Message,
    pub attachment: Option<AttachmentPreview>,
}

/// 会话列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub unread_only: bool,
    pub client_id: Option<String>,
}

impl ConversationFilter {
    pub fn matches(&self, conversation: &Conversation) -> bool {
        if let Some(status) = self.status {
            if conversation.status != status {
                return false;
            }
        }
        if self.unread_only && conversation.unread_count == 0 {
            return false;
        }
        match &self.client_id {
            Some(client_id) => &conversation.client_id == client_id,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSyncStatus {
    /// 会话列表加载中
    pub loading: bool,
    /// 正在加载消息的会话
    pub loading_messages: Vec<String>,
    pub last_error: Option<String>,
    /// 已乐观应用或发送中、等待后端结果的操作数
    pub pending_mutations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub conversations: Vec<Conversation>,
    pub stats: ConversationStats,
    pub active_conversation: Option<String>,
    pub status: ConversationSyncStatus,
}

/// 加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadReport {
    Applied,
    /// 结果已返回，等待更早发起的请求
    Queued,
    /// 已被更新的请求或会话结束取代
    Discarded,
}

/// 推送消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingReport {
    Applied { unread_count: u32 },
    Duplicate,
    /// 本地没有该会话，需要重新加载列表
    UnknownConversation,
}

/// 会话领域配置值对象
#[derive(Debug, Clone)]
pub struct ConversationDomainConfig {
    pub rollback_on_failure: bool,
    pub max_attachment_bytes: u64,
    /// 消息未加载的会话收到未读消息时是否立即累加未读数
    pub count_incoming_as_unread: bool,
}

impl Default for ConversationDomainConfig {
    fn default() -> Self {
        Self {
            rollback_on_failure: true,
            max_attachment_bytes: 10 * 1024 * 1024,
            count_incoming_as_unread: true,
        }
    }
}
