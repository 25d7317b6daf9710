//! 会话本地副本状态
//!
//! 会话列表与按会话缓存的消息放在同一把锁后面，
//! 预览（last_message / last_message_at）与消息缓存在同一临界区内更新。

use std::collections::{HashMap, HashSet};

use bistro_core::{FetchSequencer, ReplicaStore, Result, SyncError};
use tracing::debug;

use crate::domain::model::{Conversation, ConversationStats, ConversationSyncStatus, Message};

#[derive(Debug)]
pub struct ConversationReplica {
    pub conversations: ReplicaStore<Conversation>,
    /// 已加载消息的会话；不在表中表示尚未加载
    pub messages: HashMap<String, ReplicaStore<Message>>,
    pub list_sequencer: FetchSequencer<Vec<Conversation>>,
    /// 每个会话最近一次发起的消息加载
    pub message_loads: HashMap<String, u64>,
    pub next_load_token: u64,
    /// 未加载消息的会话中已接收的消息 id，加载后由缓存去重
    pub ingested: HashMap<String, HashSet<String>>,
    /// 会话列表被服务端结果整体替换的次数
    pub generation: u64,
    /// 各会话消息缓存被服务端结果替换的次数
    pub message_generations: HashMap<String, u64>,
    pub active: Option<String>,
    pub status: ConversationSyncStatus,
    pub closed: bool,
}

impl ConversationReplica {
    pub fn new() -> Self {
        Self {
            conversations: ReplicaStore::new(),
            messages: HashMap::new(),
            list_sequencer: FetchSequencer::new(),
            message_loads: HashMap::new(),
            next_load_token: 0,
            ingested: HashMap::new(),
            generation: 0,
            message_generations: HashMap::new(),
            active: None,
            status: ConversationSyncStatus::default(),
            closed: false,
        }
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SyncError::SessionClosed);
        }
        Ok(())
    }

    pub fn conversation(&self, id: &str) -> Result<&Conversation> {
        self.conversations
            .get(id)
            .ok_or_else(|| SyncError::not_found("conversation", id))
    }

    pub fn conversation_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| SyncError::not_found("conversation", id))
    }

    /// 会话当前的版本；服务端结果覆盖过该会话后版本改变
    pub fn revision(&self, conversation_id: &str) -> (u64, u64) {
        let messages = self
            .message_generations
            .get(conversation_id)
            .copied()
            .unwrap_or(0);
        (self.generation, messages)
    }

    pub fn issue_message_load(&mut self, conversation_id: &str) -> u64 {
        let token = self.next_load_token;
        self.next_load_token += 1;
        self.message_loads.insert(conversation_id.to_string(), token);
        self.sync_loading_messages();
        token
    }

    /// 结束一次消息加载，返回它是否仍是该会话最新的请求
    pub fn finish_message_load(&mut self, conversation_id: &str, token: u64) -> bool {
        let current = self.message_loads.get(conversation_id) == Some(&token);
        if current {
            self.message_loads.remove(conversation_id);
            self.sync_loading_messages();
        }
        current
    }

    fn sync_loading_messages(&mut self) {
        let mut loading: Vec<String> = self.message_loads.keys().cloned().collect();
        loading.sort();
        self.status.loading_messages = loading;
    }

    /// 以服务端列表整体替换会话
    ///
    /// 已缓存的消息若落后于服务端预览则失效，否则以缓存为准重新对齐未读数与预览。
    pub fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations.replace_all(conversations);
        self.generation += 1;

        let known: HashSet<String> = self
            .conversations
            .iter()
            .map(|c| c.id.clone())
            .collect();
        self.messages.retain(|id, _| known.contains(id));
        self.ingested.retain(|id, _| known.contains(id));
        if let Some(active) = &self.active {
            if !known.contains(active) {
                self.active = None;
            }
        }

        let cached: Vec<String> = self.messages.keys().cloned().collect();
        for id in cached {
            let server_latest = self.conversations.get(&id).and_then(|c| c.last_message_at);
            let cache_latest = self
                .messages
                .get(&id)
                .and_then(|store| store.iter().map(|m| m.created_at).max());
            if server_latest > cache_latest {
                debug!(conversation_id = %id, "Message cache is behind the server, invalidating");
                self.messages.remove(&id);
            } else {
                self.reconcile_from_cache(&id);
            }
        }
        self.sort_conversations();
    }

    /// 以服务端消息列表替换某会话的缓存，并对齐未读数与预览
    pub fn replace_messages(&mut self, conversation_id: &str, messages: Vec<Message>) {
        let mut store = ReplicaStore::new();
        for message in messages {
            if message.conversation_id == conversation_id {
                store.upsert(message);
            }
        }
        store.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.messages.insert(conversation_id.to_string(), store);
        self.ingested.remove(conversation_id);
        *self
            .message_generations
            .entry(conversation_id.to_string())
            .or_default() += 1;
        self.reconcile_from_cache(conversation_id);
        self.sort_conversations();
    }

    /// 将一条服务端消息并入缓存（若已加载）并更新预览
    pub fn insert_message(&mut self, message: Message) {
        let conversation_id = message.conversation_id.clone();
        if let Some(store) = self.messages.get_mut(&conversation_id) {
            store.upsert(message);
            store.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            self.reconcile_from_cache(&conversation_id);
        } else if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
            if conversation.last_message_at.is_none_or(|at| at <= message.created_at) {
                conversation.last_message_at = Some(message.created_at);
                conversation.last_message = Some(message.preview_text());
            }
        }
        self.sort_conversations();
    }

    /// 已加载消息的会话：未读数等于未读消息数，预览等于最新一条消息
    pub fn reconcile_from_cache(&mut self, conversation_id: &str) {
        let Some(store) = self.messages.get(conversation_id) else {
            return;
        };
        let unread = store.iter().filter(|m| m.counts_as_unread()).count() as u32;
        let newest = store.iter().max_by_key(|m| m.created_at).cloned();

        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.unread_count = unread;
            if let Some(newest) = newest {
                conversation.last_message_at = Some(newest.created_at);
                conversation.last_message = Some(newest.preview_text());
            }
        }
    }

    /// 按最近消息时间倒序，没有消息的排在最后
    pub fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    }

    pub fn has_message(&self, message: &Message) -> bool {
        self.messages
            .get(&message.conversation_id)
            .is_some_and(|store| store.contains(&message.id))
    }

    /// 登记一条服务端消息，已见过时返回 `false`
    pub fn record_ingested(&mut self, message: &Message) -> bool {
        if self.has_message(message) {
            return false;
        }
        if self.messages.contains_key(&message.conversation_id) {
            return true;
        }
        self.ingested
            .entry(message.conversation_id.clone())
            .or_default()
            .insert(message.id.clone())
    }

    pub fn stats(&self) -> ConversationStats {
        let mut stats = ConversationStats::default();
        for conversation in self.conversations.iter() {
            stats.total_conversations += 1;
            if conversation.unread_count > 0 {
                stats.unread_conversations += 1;
            }
            stats.unread_messages += conversation.unread_count as u64;
        }
        stats.total_messages = self.messages.values().map(|s| s.len() as u64).sum();
        stats
    }

    pub fn has_unread_messages(&self, conversation_id: &str) -> bool {
        self.messages
            .get(conversation_id)
            .is_some_and(|store| store.iter().any(|m| !m.is_read))
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.messages.clear();
        self.message_loads.clear();
        self.ingested.clear();
        self.message_generations.clear();
        self.generation += 1;
        self.active = None;
        self.list_sequencer.reset();
        self.status = ConversationSyncStatus::default();
    }
}

impl Default for ConversationReplica {
    fn default() -> Self {
        Self::new()
    }
}
