//! 会话领域服务
//!
//! 会话级对象，由组合根构建并持有。锁只在两次 await 之间持有。

use std::sync::Arc;

use bistro_core::metrics::SYNC_METRICS;
use bistro_core::{Completion, Result, SessionIdentity, SyncError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::model::{
    Conversation, ConversationDomainConfig, ConversationFilter, ConversationSnapshot,
    ConversationStats, ConversationStatus, IncomingReport, LoadReport, Message, MessageType,
    NewMessage, OutgoingMessage, SentMessage,
};
use crate::domain::repository::ConversationGateway;
use crate::domain::service::attachment::read_attachment;
use crate::domain::service::conversation_state::ConversationReplica;
use crate::domain::service::reconciliation::{self, ConversationUndo};

const ENTITY: &str = "conversation";

/// 已在本地生效、等待后端确认的变更
struct PendingMutation {
    kind: &'static str,
    undo: ConversationUndo,
    /// 变更时会话的版本，用于判断回滚是否仍然适用
    revision: (u64, u64),
}

pub struct ConversationDomainService {
    identity: SessionIdentity,
    gateway: Arc<dyn ConversationGateway>,
    config: ConversationDomainConfig,
    state: RwLock<ConversationReplica>,
}

impl ConversationDomainService {
    pub fn new(
        identity: SessionIdentity,
        gateway: Arc<dyn ConversationGateway>,
        config: ConversationDomainConfig,
    ) -> Self {
        Self {
            identity,
            gateway,
            config,
            state: RwLock::new(ConversationReplica::new()),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// 拉取会话列表并整体替换；按发起顺序应用，会话结束后的结果被丢弃
    pub async fn load_conversations(&self) -> Result<LoadReport> {
        let ticket = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.status.loading = true;
            state.list_sequencer.issue()
        };
        debug!(user_id = %self.identity.user_id, seq = ticket.seq, "Loading conversations");

        let result = self.gateway.list_conversations().await;
        SYNC_METRICS.record_fetch(ENTITY, result.is_ok());

        let mut state = self.state.write().await;
        if state.closed {
            SYNC_METRICS.record_stale_fetch(ENTITY);
            return Ok(LoadReport::Discarded);
        }
        match result {
            Ok(conversations) => match state.list_sequencer.complete(ticket, Some(conversations)) {
                Completion::Stale => {
                    SYNC_METRICS.record_stale_fetch(ENTITY);
                    warn!(seq = ticket.seq, "Discarding superseded conversation list");
                    Ok(LoadReport::Discarded)
                }
                Completion::Ready(lists) if lists.is_empty() => Ok(LoadReport::Queued),
                Completion::Ready(lists) => {
                    for list in lists {
                        state.replace_conversations(list);
                    }
                    if state.list_sequencer.in_flight() == 0 {
                        state.status.loading = false;
                    }
                    state.status.last_error = None;
                    info!(count = state.conversations.len(), "Conversations loaded");
                    Ok(LoadReport::Applied)
                }
            },
            Err(err) => {
                // 失败只释放顺位，之后已返回的列表可以继续应用
                if let Completion::Ready(lists) = state.list_sequencer.complete(ticket, None) {
                    for list in lists {
                        state.replace_conversations(list);
                    }
                }
                if state.list_sequencer.in_flight() == 0 {
                    state.status.loading = false;
                }
                warn!(error = %err, "Conversation list fetch failed");
                state.status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// 设为当前打开的会话并加载其消息
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<LoadReport> {
        {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.conversation(conversation_id)?;
            state.active = Some(conversation_id.to_string());
        }
        debug!(conversation_id = %conversation_id, "Conversation opened");
        self.load_messages(conversation_id).await
    }

    /// 加载会话消息；同一会话只有最近一次发起的加载生效
    pub async fn load_messages(&self, conversation_id: &str) -> Result<LoadReport> {
        let token = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.conversation(conversation_id)?;
            state.issue_message_load(conversation_id)
        };

        let result = self.gateway.list_messages(conversation_id).await;
        SYNC_METRICS.record_fetch("message", result.is_ok());

        let mut state = self.state.write().await;
        if state.closed || !state.finish_message_load(conversation_id, token) {
            SYNC_METRICS.record_stale_fetch("message");
            debug!(conversation_id = %conversation_id, token, "Discarding superseded message load");
            return Ok(LoadReport::Discarded);
        }

        match result {
            Ok(messages) => {
                if state.conversations.contains(conversation_id) {
                    let count = messages.len();
                    state.replace_messages(conversation_id, messages);
                    debug!(conversation_id = %conversation_id, count, "Messages loaded");
                    Ok(LoadReport::Applied)
                } else {
                    Ok(LoadReport::Discarded)
                }
            }
            Err(err) => {
                warn!(conversation_id = %conversation_id, error = %err, "Message fetch failed");
                state.status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn mark_as_read(&self, conversation_id: &str) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            let Some(undo) = reconciliation::mark_read(&mut *state, conversation_id)? else {
                debug!(conversation_id = %conversation_id, "Conversation has no unread messages");
                return Ok(());
            };
            state.status.pending_mutations += 1;
            PendingMutation {
                kind: "mark_read",
                undo,
                revision: state.revision(conversation_id),
            }
        };

        let result = self.gateway.mark_read(conversation_id).await;
        self.settle(pending, result).await
    }

    pub async fn archive(&self, conversation_id: &str) -> Result<()> {
        self.transition(conversation_id, ConversationStatus::Archived, "archive")
            .await
    }

    pub async fn close(&self, conversation_id: &str) -> Result<()> {
        self.transition(conversation_id, ConversationStatus::Closed, "close")
            .await
    }

    async fn transition(
        &self,
        conversation_id: &str,
        target: ConversationStatus,
        kind: &'static str,
    ) -> Result<()> {
        let pending = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            let undo = reconciliation::transition(&mut *state, conversation_id, target)
                .inspect_err(|err| {
                    debug!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "Status transition rejected"
                    )
                })?;
            state.status.pending_mutations += 1;
            PendingMutation {
                kind,
                undo,
                revision: state.revision(conversation_id),
            }
        };

        let result = match target {
            ConversationStatus::Archived => self.gateway.archive(conversation_id).await,
            _ => self.gateway.close(conversation_id).await,
        };
        self.settle(pending, result).await
    }

    /// 结算变更；期间服务端结果已覆盖该会话时不再回滚
    async fn settle(&self, pending: PendingMutation, result: Result<()>) -> Result<()> {
        let PendingMutation {
            kind,
            undo,
            revision,
        } = pending;
        let mut state = self.state.write().await;
        state.status.pending_mutations = state.status.pending_mutations.saturating_sub(1);

        let err = match result {
            Ok(()) => {
                SYNC_METRICS.record_mutation(ENTITY, kind, true);
                info!(kind, "Conversation mutation confirmed");
                return Ok(());
            }
            Err(err) => err.into_mutation(kind),
        };
        SYNC_METRICS.record_mutation(ENTITY, kind, false);

        if state.closed {
            return Err(err);
        }
        let current = state.revision(undo.conversation_id()) == revision;
        if self.config.rollback_on_failure && current {
            reconciliation::revert(&mut *state, undo);
            SYNC_METRICS.record_rollback(ENTITY, kind);
            warn!(kind, error = %err, "Conversation mutation failed, local change rolled back");
        } else if self.config.rollback_on_failure {
            warn!(
                kind,
                error = %err,
                "Conversation mutation failed, server data superseded the local change"
            );
        } else {
            warn!(kind, error = %err, "Conversation mutation failed");
        }
        state.status.last_error = Some(err.to_string());
        Err(err)
    }

    /// 发送新消息
    ///
    /// 服务端返回消息后才并入缓存（客户端不生成 id），并在同一临界区内更新会话预览。
    pub async fn send_new_message(
        &self,
        conversation_id: &str,
        new_message: NewMessage,
    ) -> Result<SentMessage> {
        {
            let state = self.state.read().await;
            state.ensure_open()?;
            let conversation = state.conversation(conversation_id)?;
            if conversation.status != ConversationStatus::Active {
                return Err(SyncError::mutation(
                    "send_message",
                    format!("conversation {} is {}", conversation_id, conversation.status),
                ));
            }
        }
        if new_message.content.trim().is_empty() && new_message.attachment.is_none() {
            return Err(SyncError::mutation("send_message", "message is empty"));
        }

        let (preview, payload) = match &new_message.attachment {
            Some(path) => {
                let (preview, payload) =
                    read_attachment(path, self.config.max_attachment_bytes).await?;
                (Some(preview), Some(payload))
            }
            None => (None, None),
        };

        let message_type = match (&preview, new_message.message_type) {
            (Some(preview), MessageType::Text) if preview.is_image() => MessageType::Image,
            (Some(_), MessageType::Text) => MessageType::File,
            (_, message_type) => message_type,
        };
        let outgoing = OutgoingMessage {
            conversation_id: conversation_id.to_string(),
            content: new_message.content,
            message_type,
            attachment: payload,
        };

        {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.status.pending_mutations += 1;
        }
        debug!(
            conversation_id = %conversation_id,
            message_type = message_type.as_str(),
            has_attachment = outgoing.attachment.is_some(),
            "Sending message"
        );

        let result = self.gateway.send_message(&outgoing).await;

        let mut state = self.state.write().await;
        state.status.pending_mutations = state.status.pending_mutations.saturating_sub(1);
        SYNC_METRICS.record_mutation(ENTITY, "send_message", result.is_ok());

        let message = match result {
            Ok(message) => message,
            Err(err) => {
                let err = err.into_mutation("send_message");
                warn!(conversation_id = %conversation_id, error = %err, "Message send failed");
                if !state.closed {
                    state.status.last_error = Some(err.to_string());
                }
                return Err(err);
            }
        };

        if !state.closed {
            state.record_ingested(&message);
            state.insert_message(message.clone());
            info!(conversation_id = %conversation_id, message_id = %message.id, "Message sent");
        }
        Ok(SentMessage {
            message,
            attachment: preview,
        })
    }

    /// 接收服务端推送的消息
    ///
    /// 已加载消息的会话：并入缓存后未读数由缓存重新计算。
    /// 未加载消息的会话：`count_incoming_as_unread` 为真时未读消息立即累加未读数，
    /// 否则等待下一次拉取。
    pub async fn apply_incoming_message(&self, message: Message) -> Result<IncomingReport> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        if !state.conversations.contains(&message.conversation_id) {
            debug!(
                conversation_id = %message.conversation_id,
                "Incoming message for unknown conversation"
            );
            return Ok(IncomingReport::UnknownConversation);
        }
        if !state.record_ingested(&message) {
            return Ok(IncomingReport::Duplicate);
        }

        let conversation_id = message.conversation_id.clone();
        let cached = state.messages.contains_key(&conversation_id);
        let counts = message.counts_as_unread();
        state.insert_message(message);

        if !cached && counts && self.config.count_incoming_as_unread {
            if let Ok(conversation) = state.conversation_mut(&conversation_id) {
                conversation.unread_count += 1;
            }
        }

        let unread_count = state.conversation(&conversation_id)?.unread_count;
        debug!(conversation_id = %conversation_id, unread_count, "Incoming message applied");
        Ok(IncomingReport::Applied { unread_count })
    }

    pub async fn snapshot(&self, filter: &ConversationFilter) -> ConversationSnapshot {
        let state = self.state.read().await;
        ConversationSnapshot {
            conversations: state
                .conversations
                .iter()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect(),
            stats: state.stats(),
            active_conversation: state.active.clone(),
            status: state.status.clone(),
        }
    }

    pub async fn stats(&self) -> ConversationStats {
        self.state.read().await.stats()
    }

    pub async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.state
            .read()
            .await
            .conversations
            .get(conversation_id)
            .cloned()
    }

    /// 会话消息快照（按时间升序）；未加载时返回 `None`
    pub async fn messages(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.state
            .read()
            .await
            .messages
            .get(conversation_id)
            .map(|store| store.snapshot())
    }

    pub async fn end_session(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.clear();
        info!(user_id = %self.identity.user_id, "Conversation session ended");
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }
}
