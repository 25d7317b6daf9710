use std::sync::Arc;

use bistro_core::Result;
use tracing::{debug, info};

use crate::application::commands::{
    DeleteMultipleCommand, DeleteNotificationCommand, LoadNotificationsCommand, MarkAllReadCommand,
    MarkReadCommand, MarkUnreadCommand,
};
use crate::application::queries::NotificationSnapshotQuery;
use crate::domain::model::{FetchReport, NotificationSnapshot, NotificationStats};
use crate::domain::service::NotificationDomainService;

/// 通知命令处理器
pub struct NotificationCommandHandler {
    domain_service: Arc<NotificationDomainService>,
}

impl NotificationCommandHandler {
    pub fn new(domain_service: Arc<NotificationDomainService>) -> Self {
        Self { domain_service }
    }

    pub async fn handle_load(&self, command: LoadNotificationsCommand) -> Result<FetchReport> {
        debug!(command = ?command, "Handling load notifications command");

        let report = match command {
            LoadNotificationsCommand::FirstPage => self.domain_service.load_first_page().await?,
            LoadNotificationsCommand::NextPage => self.domain_service.fetch_next_page().await?,
            LoadNotificationsCommand::Refresh => self.domain_service.refresh().await?,
        };

        info!(command = ?command, report = ?report, "Notification load completed");
        Ok(report)
    }

    pub async fn handle_mark_read(&self, command: MarkReadCommand) -> Result<()> {
        debug!(notification_id = %command.notification_id, "Handling mark read command");

        self.domain_service
            .mark_as_read(&command.notification_id)
            .await?;

        info!(notification_id = %command.notification_id, "Notification marked as read");
        Ok(())
    }

    pub async fn handle_mark_unread(&self, command: MarkUnreadCommand) -> Result<()> {
        debug!(notification_id = %command.notification_id, "Handling mark unread command");

        self.domain_service
            .mark_as_unread(&command.notification_id)
            .await?;

        info!(notification_id = %command.notification_id, "Notification marked as unread");
        Ok(())
    }

    pub async fn handle_mark_all_read(&self, _command: MarkAllReadCommand) -> Result<()> {
        let user_id = &self.domain_service.identity().user_id;
        debug!(user_id = %user_id, "Handling mark all read command");

        self.domain_service.mark_all_as_read().await?;

        info!(user_id = %user_id, "All notifications marked as read");
        Ok(())
    }

    pub async fn handle_delete(&self, command: DeleteNotificationCommand) -> Result<()> {
        debug!(notification_id = %command.notification_id, "Handling delete notification command");

        self.domain_service
            .delete_notification(&command.notification_id)
            .await?;

        info!(notification_id = %command.notification_id, "Notification deleted");
        Ok(())
    }

    pub async fn handle_delete_multiple(&self, command: DeleteMultipleCommand) -> Result<usize> {
        debug!(
            count = command.notification_ids.len(),
            "Handling delete multiple notifications command"
        );

        let deleted = self
            .domain_service
            .delete_multiple(&command.notification_ids)
            .await?;

        info!(deleted, "Notifications deleted");
        Ok(deleted)
    }
}

/// 通知查询处理器
pub struct NotificationQueryHandler {
    domain_service: Arc<NotificationDomainService>,
}

impl NotificationQueryHandler {
    pub fn new(domain_service: Arc<NotificationDomainService>) -> Self {
        Self { domain_service }
    }

    pub async fn handle_snapshot(&self, query: NotificationSnapshotQuery) -> NotificationSnapshot {
        let mut snapshot = self.domain_service.snapshot().await;
        if query.unread_only {
            snapshot.items.retain(|n| !n.is_read);
        }
        if let Some(kind) = &query.notification_type {
            snapshot.items.retain(|n| &n.notification_type == kind);
        }
        snapshot
    }

    pub async fn handle_stats(&self) -> NotificationStats {
        self.domain_service.stats().await
    }
}
