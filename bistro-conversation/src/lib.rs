//! 后台会话同步核心
//!
//! 会话列表缓存、消息缓存、未读数对齐与会话状态机。

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;

pub use config::ConversationConfig;
pub use domain::model::{
    Conversation, ConversationFilter, ConversationSnapshot, ConversationStats, ConversationStatus,
    Message, MessageType, NewMessage, SenderType,
};
pub use domain::repository::ConversationGateway;
pub use domain::service::ConversationDomainService;
