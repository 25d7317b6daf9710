//! 会话乐观变更与回滚

use bistro_core::Result;

use crate::domain::model::ConversationStatus;
use crate::domain::service::conversation_state::ConversationReplica;

/// 变更的逆操作
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationUndo {
    /// 标记已读前的未读数与被置为已读的消息
    Read {
        conversation_id: String,
        unread_count: u32,
        messages: Vec<String>,
    },
    Status {
        conversation_id: String,
        from: ConversationStatus,
        to: ConversationStatus,
    },
}

impl ConversationUndo {
    pub fn conversation_id(&self) -> &str {
        match self {
            ConversationUndo::Read {
                conversation_id, ..
            }
            | ConversationUndo::Status {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// 标记会话已读：未读数清零，缓存中所有消息置为已读。
/// 已无未读时返回 `None`。
pub fn mark_read(
    state: &mut ConversationReplica,
    conversation_id: &str,
) -> Result<Option<ConversationUndo>> {
    let has_unread_messages = state.has_unread_messages(conversation_id);
    let conversation = state.conversation_mut(conversation_id)?;
    if conversation.unread_count == 0 && !has_unread_messages {
        return Ok(None);
    }

    let unread_count = conversation.unread_count;
    conversation.unread_count = 0;

    let mut flipped = Vec::new();
    if let Some(store) = state.messages.get_mut(conversation_id) {
        for message in store.iter_mut() {
            if !message.is_read {
                message.is_read = true;
                flipped.push(message.id.clone());
            }
        }
    }

    Ok(Some(ConversationUndo::Read {
        conversation_id: conversation_id.to_string(),
        unread_count,
        messages: flipped,
    }))
}

/// 状态迁移；不合法的迁移不修改本地状态
pub fn transition(
    state: &mut ConversationReplica,
    conversation_id: &str,
    target: ConversationStatus,
) -> Result<ConversationUndo> {
    let conversation = state.conversation_mut(conversation_id)?;
    let from = conversation.status;
    conversation.status = from.transition_to(target)?;
    Ok(ConversationUndo::Status {
        conversation_id: conversation_id.to_string(),
        from,
        to: target,
    })
}

/// 恢复变更前状态；已被后续变更覆盖的部分保持不动
pub fn revert(state: &mut ConversationReplica, undo: ConversationUndo) {
    match undo {
        ConversationUndo::Read {
            conversation_id,
            unread_count,
            messages,
        } => {
            if let Some(store) = state.messages.get_mut(&conversation_id) {
                for id in &messages {
                    if let Some(message) = store.get_mut(id) {
                        message.is_read = false;
                    }
                }
                state.reconcile_from_cache(&conversation_id);
            } else if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
                // 期间新到的消息已累加在当前值上
                conversation.unread_count += unread_count;
            }
        }
        ConversationUndo::Status {
            conversation_id,
            from,
            to,
        } => {
            if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
                if conversation.status == to {
                    conversation.status = from;
                }
            }
        }
    }
}
