//! 基于 REST 后端的通知网关

use async_trait::async_trait;
use bistro_core::{BackendClient, PageCursor, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::model::{FetchOutcome, Notification, NotificationQuery};
use crate::domain::repository::NotificationGateway;

/// 管理员分页响应 `{data, meta}`
#[derive(Debug, Deserialize)]
struct PagedResponse {
    data: Vec<Notification>,
    meta: PageCursor,
}

#[derive(Debug, Serialize)]
struct DeleteMultipleBody<'a> {
    ids: &'a [String],
}

pub struct HttpNotificationGateway {
    client: BackendClient,
}

impl HttpNotificationGateway {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn fetch_page(&self, query: &NotificationQuery) -> Result<FetchOutcome> {
        if query.role.is_privileged() {
            let params = [
                ("page", query.page.to_string()),
                ("limit", query.limit.to_string()),
                ("target", query.target.clone()),
            ];
            let response: PagedResponse = self.client.get_json("notifications", &params).await?;
            debug!(
                page = response.meta.page,
                total_pages = response.meta.total_pages,
                count = response.data.len(),
                "Fetched paged notifications"
            );
            Ok(FetchOutcome::Paged {
                items: response.data,
                meta: response.meta,
            })
        } else {
            let path = format!("notifications/user/{}", query.user_id);
            let items: Vec<Notification> = self.client.get_json(&path, &[]).await?;
            debug!(count = items.len(), "Fetched unpaged notifications");
            Ok(FetchOutcome::Unpaged { items })
        }
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.client
            .send_empty::<()>(Method::PATCH, &format!("notifications/{}/read", id), None)
            .await
    }

    async fn mark_unread(&self, id: &str) -> Result<()> {
        self.client
            .send_empty::<()>(Method::PATCH, &format!("notifications/{}/unread", id), None)
            .await
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        self.client
            .send_empty::<()>(
                Method::PATCH,
                &format!("notifications/user/{}/read-all", user_id),
                None,
            )
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .send_empty::<()>(Method::DELETE, &format!("notifications/{}", id), None)
            .await
    }

    async fn delete_many(&self, ids: &[String]) -> Result<()> {
        self.client
            .send_empty(
                Method::POST,
                "notifications/delete-multiple",
                Some(&DeleteMultipleBody { ids }),
            )
            .await
    }
}
