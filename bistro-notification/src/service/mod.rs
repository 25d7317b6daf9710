pub mod wire;

use anyhow::Result;
use bistro_core::{BistroAppConfig, SessionIdentity};
use tracing::info;

use crate::application::commands::LoadNotificationsCommand;
use crate::domain::model::{FetchReport, NotificationSnapshot};
use crate::service::wire::ApplicationContext;

/// 通知同步应用（一次会话）
pub struct NotificationServiceApp {
    context: ApplicationContext,
}

impl NotificationServiceApp {
    pub fn new(app_config: &BistroAppConfig, identity: SessionIdentity) -> Result<Self> {
        let context = wire::initialize(app_config, identity)?;
        Ok(Self { context })
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    /// 加载第一页，管理员继续加载剩余所有页
    pub async fn run(&self) -> Result<NotificationSnapshot> {
        let handler = &self.context.command_handler;
        handler.handle_load(LoadNotificationsCommand::FirstPage).await?;

        loop {
            let snapshot = self.context.domain_service.snapshot().await;
            if !snapshot.has_more_pages {
                break;
            }
            let report = handler.handle_load(LoadNotificationsCommand::NextPage).await?;
            if report == FetchReport::Skipped {
                break;
            }
        }

        let snapshot = self.context.domain_service.snapshot().await;
        info!(
            total = snapshot.stats.total,
            unread = snapshot.stats.unread,
            "Notification session loaded"
        );
        Ok(snapshot)
    }

    pub async fn shutdown(&self) {
        self.context.domain_service.end_session().await;
    }
}
