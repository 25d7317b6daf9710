#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bistro_core::{PageCursor, Result, SyncError};
use bistro_notification::domain::model::{
    FetchOutcome, Notification, NotificationQuery, NotificationTarget,
};
use bistro_notification::domain::repository::NotificationGateway;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

pub fn notification(id: &str, target: &str, is_read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        target: NotificationTarget::from(target.to_string()),
        notification_type: "ORDER".to_string(),
        title: format!("Notification {}", id),
        message: "A new order was placed".to_string(),
        is_read,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        data: serde_json::json!({ "orderId": id }),
    }
}

/// 生成 `pages` 页、每页 `per_page` 条的未读通知，id 形如 `p{page}-{n}`
pub fn paged_fixture(pages: u32, per_page: u32) -> Vec<Vec<Notification>> {
    (1..=pages)
        .map(|page| {
            (1..=per_page)
                .map(|n| notification(&format!("p{}-{}", page, n), "USER", false))
                .collect()
        })
        .collect()
}

/// 内存网关：可注入失败并通过 oneshot 控制拉取返回顺序
#[derive(Default)]
pub struct FakeGateway {
    pages: Mutex<Vec<Vec<Notification>>>,
    unpaged: Mutex<Vec<Notification>>,
    gates: Mutex<HashMap<u32, oneshot::Receiver<()>>>,
    mutation_gate: Mutex<Option<oneshot::Receiver<()>>>,
    failing_pages: Mutex<HashSet<u32>>,
    fail_mutations: AtomicBool,
    calls: Mutex<Vec<String>>,
    fetched_pages: Mutex<Vec<u32>>,
}

impl FakeGateway {
    pub fn paged(pages: Vec<Vec<Notification>>) -> Self {
        let gateway = Self::default();
        *gateway.pages.lock().unwrap() = pages;
        gateway
    }

    pub fn unpaged(items: Vec<Notification>) -> Self {
        let gateway = Self::default();
        *gateway.unpaged.lock().unwrap() = items;
        gateway
    }

    pub fn set_page(&self, page: u32, items: Vec<Notification>) {
        let mut pages = self.pages.lock().unwrap();
        pages[(page - 1) as usize] = items;
    }

    /// 拉取该页时阻塞，直到返回的 sender 被触发
    pub fn gate_page(&self, page: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(page, rx);
        tx
    }

    /// 下一次变更调用阻塞，直到返回的 sender 被触发
    pub fn gate_mutations(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.mutation_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// 该页的下一次拉取失败
    pub fn fail_page_once(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched_pages(&self) -> Vec<u32> {
        self.fetched_pages.lock().unwrap().clone()
    }

    async fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        let gate = self.mutation_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SyncError::Fetch {
                status: Some(500),
                message: format!("HTTP 500: {} rejected", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for FakeGateway {
    async fn fetch_page(&self, query: &NotificationQuery) -> Result<FetchOutcome> {
        let gate = self.gates.lock().unwrap().remove(&query.page);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.fetched_pages.lock().unwrap().push(query.page);

        if self.failing_pages.lock().unwrap().remove(&query.page) {
            return Err(SyncError::Fetch {
                status: Some(503),
                message: "HTTP 503 Service Unavailable".to_string(),
            });
        }

        if !query.role.is_privileged() {
            let items = self.unpaged.lock().unwrap().clone();
            return Ok(FetchOutcome::Unpaged { items });
        }

        let pages = self.pages.lock().unwrap();
        let total: usize = pages.iter().map(Vec::len).sum();
        let items = pages
            .get((query.page - 1) as usize)
            .cloned()
            .unwrap_or_default();
        Ok(FetchOutcome::Paged {
            items,
            meta: PageCursor {
                page: query.page,
                total_pages: pages.len() as u32,
                limit: query.limit,
                total: total as u64,
            },
        })
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.record(format!("mark_read:{}", id)).await
    }

    async fn mark_unread(&self, id: &str) -> Result<()> {
        self.record(format!("mark_unread:{}", id)).await
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        self.record(format!("mark_all_read:{}", user_id)).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record(format!("delete:{}", id)).await
    }

    async fn delete_many(&self, ids: &[String]) -> Result<()> {
        self.record(format!("delete_many:{}", ids.join(","))).await
    }
}
