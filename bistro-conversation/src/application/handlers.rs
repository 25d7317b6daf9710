use std::sync::Arc;

use bistro_core::Result;
use tracing::{debug, info};

use crate::application::commands::{
    ArchiveConversationCommand, CloseConversationCommand, IngestMessageCommand,
    MarkConversationReadCommand, OpenConversationCommand, SendMessageCommand,
};
use crate::application::queries::{ConversationListQuery, ConversationMessagesQuery};
use crate::domain::model::{
    ConversationSnapshot, ConversationStats, IncomingReport, LoadReport, Message, SentMessage,
};
use crate::domain::service::ConversationDomainService;

/// 会话命令处理器
pub struct ConversationCommandHandler {
    domain_service: Arc<ConversationDomainService>,
}

impl ConversationCommandHandler {
    pub fn new(domain_service: Arc<ConversationDomainService>) -> Self {
        Self { domain_service }
    }

    pub async fn handle_load_conversations(&self) -> Result<LoadReport> {
        debug!("Handling load conversations command");
        let report = self.domain_service.load_conversations().await?;
        info!(report = ?report, "Conversation list load completed");
        Ok(report)
    }

    pub async fn handle_open(&self, command: OpenConversationCommand) -> Result<LoadReport> {
        debug!(conversation_id = %command.conversation_id, "Handling open conversation command");
        self.domain_service
            .open_conversation(&command.conversation_id)
            .await
    }

    pub async fn handle_mark_read(&self, command: MarkConversationReadCommand) -> Result<()> {
        debug!(
            conversation_id = %command.conversation_id,
            "Handling mark conversation read command"
        );

        self.domain_service
            .mark_as_read(&command.conversation_id)
            .await?;

        info!(conversation_id = %command.conversation_id, "Conversation marked as read");
        Ok(())
    }

    pub async fn handle_archive(&self, command: ArchiveConversationCommand) -> Result<()> {
        debug!(conversation_id = %command.conversation_id, "Handling archive conversation command");

        self.domain_service.archive(&command.conversation_id).await?;

        info!(conversation_id = %command.conversation_id, "Conversation archived");
        Ok(())
    }

    pub async fn handle_close(&self, command: CloseConversationCommand) -> Result<()> {
        debug!(conversation_id = %command.conversation_id, "Handling close conversation command");

        self.domain_service.close(&command.conversation_id).await?;

        info!(conversation_id = %command.conversation_id, "Conversation closed");
        Ok(())
    }

    pub async fn handle_send_message(&self, command: SendMessageCommand) -> Result<SentMessage> {
        debug!(
            conversation_id = %command.conversation_id,
            has_attachment = command.message.attachment.is_some(),
            "Handling send message command"
        );

        self.domain_service
            .send_new_message(&command.conversation_id, command.message)
            .await
    }

    pub async fn handle_ingest(&self, command: IngestMessageCommand) -> Result<IncomingReport> {
        debug!(
            conversation_id = %command.message.conversation_id,
            message_id = %command.message.id,
            "Handling incoming message"
        );
        self.domain_service
            .apply_incoming_message(command.message)
            .await
    }
}

/// 会话查询处理器
pub struct ConversationQueryHandler {
    domain_service: Arc<ConversationDomainService>,
}

impl ConversationQueryHandler {
    pub fn new(domain_service: Arc<ConversationDomainService>) -> Self {
        Self { domain_service }
    }

    pub async fn handle_list(&self, query: ConversationListQuery) -> ConversationSnapshot {
        self.domain_service.snapshot(&query.filter).await
    }

    pub async fn handle_messages(&self, query: ConversationMessagesQuery) -> Option<Vec<Message>> {
        self.domain_service.messages(&query.conversation_id).await
    }

    pub async fn handle_stats(&self) -> ConversationStats {
        self.domain_service.stats().await
    }
}
