//! 基于 REST 后端的会话网关

use async_trait::async_trait;
use bistro_core::{BackendClient, Result};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::debug;

use crate::domain::model::{Conversation, Message, MessageType, OutgoingMessage};
use crate::domain::repository::ConversationGateway;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    content: &'a str,
    message_type: MessageType,
}

pub struct HttpConversationGateway {
    client: BackendClient,
}

impl HttpConversationGateway {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn patch(&self, conversation_id: &str, action: &str) -> Result<()> {
        let path = format!("chat/conversations/{}/{}", conversation_id, action);
        self.client
            .send_empty::<()>(Method::PATCH, &path, None)
            .await
    }
}

/// 附件消息的 multipart 表单
fn multipart_form(message: &OutgoingMessage) -> Result<Option<Form>> {
    let Some(attachment) = &message.attachment else {
        return Ok(None);
    };
    let part = Part::bytes(attachment.bytes.clone())
        .file_name(attachment.file_name.clone())
        .mime_str(&attachment.mime_type)?;
    let form = Form::new()
        .text("content", message.content.clone())
        .text("messageType", message.message_type.as_str())
        .part("file", part);
    Ok(Some(form))
}

#[async_trait]
impl ConversationGateway for HttpConversationGateway {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations: Vec<Conversation> =
            self.client.get_json("chat/conversations", &[]).await?;
        debug!(count = conversations.len(), "Fetched conversations");
        Ok(conversations)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let path = format!("chat/conversations/{}/messages", conversation_id);
        let messages: Vec<Message> = self.client.get_json(&path, &[]).await?;
        debug!(conversation_id = %conversation_id, count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        let path = format!("chat/conversations/{}/messages", message.conversation_id);
        match multipart_form(message)? {
            Some(form) => self.client.send_multipart(&path, form).await,
            None => {
                let body = SendMessageBody {
                    content: &message.content,
                    message_type: message.message_type,
                };
                self.client.send_json(Method::POST, &path, &body).await
            }
        }
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        self.patch(conversation_id, "read").await
    }

    async fn archive(&self, conversation_id: &str) -> Result<()> {
        self.patch(conversation_id, "archive").await
    }

    async fn close(&self, conversation_id: &str) -> Result<()> {
        self.patch(conversation_id, "close").await
    }
}
