#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use bistro_conversation::domain::model::{
    Conversation, ConversationStatus, Message, MessageType, OutgoingMessage, SenderType,
};
use bistro_conversation::domain::repository::ConversationGateway;
use bistro_core::{Result, SyncError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::oneshot;

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn conversation(
    id: &str,
    status: ConversationStatus,
    unread: u32,
    last: Option<i64>,
) -> Conversation {
    Conversation {
        id: id.to_string(),
        client_id: format!("client-{}", id),
        status,
        unread_count: unread,
        last_message_at: last.map(at),
        last_message: last.map(|m| format!("message at {}", m)),
    }
}

pub fn message(
    id: &str,
    conversation_id: &str,
    sender: SenderType,
    is_read: bool,
    minute: i64,
) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_type: sender,
        content: format!("text {}", id),
        message_type: MessageType::Text,
        is_read,
        created_at: at(minute),
        file_url: None,
        file_name: None,
    }
}

/// 内存网关：可注入失败并通过 oneshot 控制消息加载的返回顺序
#[derive(Default)]
pub struct FakeGateway {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    message_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    mutation_gate: Mutex<Option<oneshot::Receiver<()>>>,
    fail_mutations: AtomicBool,
    sent: AtomicU32,
    calls: Mutex<Vec<String>>,
    outgoing: Mutex<Vec<OutgoingMessage>>,
}

impl FakeGateway {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        let gateway = Self::default();
        *gateway.conversations.lock().unwrap() = conversations;
        gateway
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock().unwrap() = conversations;
    }

    pub fn set_messages(&self, conversation_id: &str, messages: Vec<Message>) {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages);
    }

    /// 下一次加载该会话消息时阻塞，直到返回的 sender 被触发
    pub fn gate_messages(&self, conversation_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.message_gates
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), rx);
        tx
    }

    /// 下一次变更调用阻塞，直到返回的 sender 被触发
    pub fn gate_mutations(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.mutation_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn outgoing(&self) -> Vec<OutgoingMessage> {
        self.outgoing.lock().unwrap().clone()
    }

    async fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        let gate = self.mutation_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SyncError::Fetch {
                status: Some(502),
                message: format!("HTTP 502: {} rejected", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationGateway for FakeGateway {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        // 先取快照再等待，模拟请求发出时的服务端状态
        let snapshot = self
            .messages
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        let gate = self.message_gates.lock().unwrap().remove(conversation_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(snapshot)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message> {
        self.record(format!("send:{}", message.conversation_id)).await?;
        self.outgoing.lock().unwrap().push(message.clone());
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Message {
            id: format!("sent-{}", n),
            conversation_id: message.conversation_id.clone(),
            sender_type: SenderType::Backoffice,
            content: message.content.clone(),
            message_type: message.message_type,
            is_read: true,
            created_at: at(100 + n as i64),
            file_url: message
                .attachment
                .as_ref()
                .map(|a| format!("/uploads/{}", a.file_name)),
            file_name: message.attachment.as_ref().map(|a| a.file_name.clone()),
        })
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        self.record(format!("read:{}", conversation_id)).await
    }

    async fn archive(&self, conversation_id: &str) -> Result<()> {
        self.record(format!("archive:{}", conversation_id)).await
    }

    async fn close(&self, conversation_id: &str) -> Result<()> {
        self.record(format!("close:{}", conversation_id)).await
    }
}
