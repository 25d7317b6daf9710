pub mod wire;

use anyhow::Result;
use bistro_core::{BistroAppConfig, SessionIdentity};
use tracing::info;

use crate::application::queries::ConversationListQuery;
use crate::domain::model::ConversationSnapshot;
use crate::service::wire::ApplicationContext;

/// 会话同步应用（一次会话）
pub struct ConversationServiceApp {
    context: ApplicationContext,
}

impl ConversationServiceApp {
    pub fn new(app_config: &BistroAppConfig, identity: SessionIdentity) -> Result<Self> {
        let context = wire::initialize(app_config, identity)?;
        Ok(Self { context })
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// 加载会话列表
    pub async fn run(&self) -> Result<ConversationSnapshot> {
        self.context
            .command_handler
            .handle_load_conversations()
            .await?;

        let snapshot = self
            .context
            .query_handler
            .handle_list(ConversationListQuery::default())
            .await;
        info!(
            conversations = snapshot.stats.total_conversations,
            unread = snapshot.stats.unread_messages,
            "Conversation session loaded"
        );
        Ok(snapshot)
    }

    pub async fn shutdown(&self) {
        self.context.domain_service.end_session().await;
    }
}
