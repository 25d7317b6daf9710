//! 通知领域服务
//!
//! 会话级对象，由组合根构建并持有。本地状态只在两次 await 之间加锁修改，
//! 锁从不跨越网络调用。

use std::sync::Arc;

use bistro_core::metrics::SYNC_METRICS;
use bistro_core::{Completion, FetchTicket, Result, SessionIdentity};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::model::{
    FetchOutcome, FetchReport, Notification, NotificationDomainConfig, NotificationSnapshot,
    NotificationStats,
};
use crate::domain::repository::NotificationGateway;
use crate::domain::service::fetcher::PaginatedFetcher;
use crate::domain::service::reconciliation::{self, Undo};
use crate::domain::service::replica_state::{NotificationReplica, PageLoad};

const ENTITY: &str = "notification";

/// 已乐观应用、等待后端结果的变更
struct PendingMutation {
    kind: &'static str,
    undo: Undo,
    generation: u64,
}

pub struct NotificationDomainService {
    identity: SessionIdentity,
    gateway: Arc<dyn NotificationGateway>,
    fetcher: PaginatedFetcher,
    config: NotificationDomainConfig,
    state: RwLock<NotificationReplica>,
}

impl NotificationDomainService {
    pub fn new(
        identity: SessionIdentity,
        gateway: Arc<dyn NotificationGateway>,
        config: NotificationDomainConfig,
    ) -> Self {
        let fetcher = PaginatedFetcher::new(gateway.clone(), &config);
        let state = RwLock::new(NotificationReplica::new(fetcher.limit()));
        Self {
            identity,
            gateway,
            fetcher,
            config,
            state,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// 清空副本并加载第一页
    pub async fn load_first_page(&self) -> Result<FetchReport> {
        self.reload(true).await
    }

    /// 以第一页结果整体替换副本（结果到达前保留当前内容）
    pub async fn refresh(&self) -> Result<FetchReport> {
        self.reload(false).await
    }

    async fn reload(&self, clear: bool) -> Result<FetchReport> {
        let ticket = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            state.restart(clear);
            state.sequencer.issue()
        };
        debug!(user_id = %self.identity.user_id, clear, "Reloading notifications from first page");

        let result = self.fetcher.fetch_page(&self.identity, 1).await;
        self.complete_fetch(ticket, 1, true, result).await
    }

    /// 请求下一个尚未请求的页
    ///
    /// 非管理员、首页尚未加载完成或没有更多页时直接返回 `Skipped`。
    /// 可以并发调用，结果按发起顺序应用。
    pub async fn fetch_next_page(&self) -> Result<FetchReport> {
        let (ticket, page) = {
            let mut state = self.state.write().await;
            state.ensure_open()?;
            if !self.identity.role.is_privileged()
                || state.status.loading
                || !state.cursor.is_loaded()
            {
                return Ok(FetchReport::Skipped);
            }

            let page = state.cursor.page.max(state.highest_requested) + 1;
            if page > state.cursor.total_pages {
                return Ok(FetchReport::Skipped);
            }
            state.highest_requested = page;
            state.page_requests += 1;
            (state.sequencer.issue(), page)
        };

        let result = self.fetcher.fetch_page(&self.identity, page).await;
        self.complete_fetch(ticket, page, false, result).await
    }

    async fn complete_fetch(
        &self,
        ticket: FetchTicket,
        page: u32,
        replace: bool,
        result: Result<FetchOutcome>,
    ) -> Result<FetchReport> {
        let mut state = self.state.write().await;
        if state.closed || !state.sequencer.is_current(&ticket) {
            SYNC_METRICS.record_stale_fetch(ENTITY);
            warn!(
                page,
                seq = ticket.seq,
                ticket_epoch = ticket.epoch,
                current_epoch = state.sequencer.epoch(),
                "Discarding superseded notification fetch"
            );
            return Ok(FetchReport::Discarded);
        }
        if !replace {
            state.page_requests = state.page_requests.saturating_sub(1);
        }

        match result {
            Ok(outcome) => {
                let (items, meta) = outcome.into_page();
                let load = PageLoad {
                    page,
                    items,
                    meta,
                    replace,
                };
                match state.sequencer.complete(ticket, Some(load)) {
                    Completion::Stale => {
                        SYNC_METRICS.record_stale_fetch(ENTITY);
                        Ok(FetchReport::Discarded)
                    }
                    Completion::Ready(loads) if loads.is_empty() => {
                        debug!(
                            page,
                            seq = ticket.seq,
                            "Notification page parked until earlier fetches resolve"
                        );
                        Ok(FetchReport::Queued)
                    }
                    Completion::Ready(loads) => {
                        let pages = loads.len();
                        for load in loads {
                            state.apply_load(load);
                        }
                        debug!(
                            pages,
                            cursor_page = state.cursor.page,
                            total = state.stats.total,
                            "Notification pages applied"
                        );
                        Ok(FetchReport::Applied { pages })
                    }
                }
            }
            Err(err) => {
                if replace {
                    state.status.loading = false;
                } else {
                    state.highest_requested = state.highest_requested.min(page.saturating_sub(1));
                }
                // 失败只释放顺位，后续已返回的页可以继续应用
                if let Completion::Ready(loads) = state.sequencer.complete(ticket, None) {
                    for load in loads {
                        state.apply_load(load);
                    }
                }
                state.status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let Some(pending) = self
            .begin("mark_read", |state| reconciliation::set_read(state, id, true))
            .await?
        else {
            debug!(notification_id = %id, "Notification already read");
            return Ok(());
        };
        let result = self.gateway.mark_read(id).await;
        self.settle(pending, result).await
    }

    pub async fn mark_as_unread(&self, id: &str) -> Result<()> {
        let Some(pending) = self
            .begin("mark_unread", |state| reconciliation::set_read(state, id, false))
            .await?
        else {
            debug!(notification_id = %id, "Notification already unread");
            return Ok(());
        };
        let result = self.gateway.mark_unread(id).await;
        self.settle(pending, result).await
    }

    /// 全部已读；未加载的页可能仍有未读记录，因此总是调用后端
    pub async fn mark_all_as_read(&self) -> Result<()> {
        let Some(pending) = self
            .begin("mark_all_read", |state| {
                Ok(Some(reconciliation::mark_all_read(state)))
            })
            .await?
        else {
            return Ok(());
        };
        let result = self.gateway.mark_all_read(&self.identity.user_id).await;
        self.settle(pending, result).await
    }

    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let Some(pending) = self
            .begin("delete", |state| reconciliation::delete(state, id).map(Some))
            .await?
        else {
            return Ok(());
        };
        let result = self.gateway.delete(id).await;
        self.settle(pending, result).await
    }

    /// 批量删除；本地不存在的 id 被忽略，全部不存在时不调用后端
    pub async fn delete_multiple(&self, ids: &[String]) -> Result<usize> {
        let mut removed_ids = Vec::new();
        let pending = self
            .begin("delete_multiple", |state| {
                let (removed, undo) = reconciliation::delete_many(state, ids);
                if removed.is_empty() {
                    return Ok(None);
                }
                removed_ids = removed;
                Ok(Some(undo))
            })
            .await?;
        let Some(pending) = pending else {
            debug!(requested = ids.len(), "No locally known notifications to delete");
            return Ok(0);
        };

        let result = self.gateway.delete_many(&removed_ids).await;
        self.settle(pending, result).await?;
        Ok(removed_ids.len())
    }

    /// 在同一个临界区内应用本地变更
    async fn begin<F>(&self, kind: &'static str, apply: F) -> Result<Option<PendingMutation>>
    where
        F: FnOnce(&mut NotificationReplica) -> Result<Option<Undo>>,
    {
        let mut state = self.state.write().await;
        state.ensure_open()?;
        let Some(undo) = apply(&mut *state)? else {
            return Ok(None);
        };
        state.status.pending_mutations += 1;
        debug!(
            kind,
            unread = state.stats.unread,
            total = state.stats.total,
            "Applied optimistic notification mutation"
        );
        Ok(Some(PendingMutation {
            kind,
            undo,
            generation: state.generation,
        }))
    }

    async fn settle(&self, pending: PendingMutation, result: Result<()>) -> Result<()> {
        let mut state = self.state.write().await;
        state.status.pending_mutations = state.status.pending_mutations.saturating_sub(1);

        let err = match result {
            Ok(()) => {
                SYNC_METRICS.record_mutation(ENTITY, pending.kind, true);
                return Ok(());
            }
            Err(err) => err.into_mutation(pending.kind),
        };
        SYNC_METRICS.record_mutation(ENTITY, pending.kind, false);

        if state.closed {
            return Err(err);
        }
        if self.config.rollback_on_failure && state.generation == pending.generation {
            let restored = reconciliation::revert(&mut *state, pending.undo);
            SYNC_METRICS.record_rollback(ENTITY, pending.kind);
            warn!(
                kind = pending.kind,
                restored,
                error = %err,
                "Notification mutation failed, local change rolled back"
            );
        } else {
            warn!(kind = pending.kind, error = %err, "Notification mutation failed");
        }
        state.status.last_error = Some(err.to_string());
        Err(err)
    }

    pub async fn snapshot(&self) -> NotificationSnapshot {
        let state = self.state.read().await;
        NotificationSnapshot {
            items: state.store.snapshot(),
            stats: state.stats,
            cursor: state.cursor,
            has_more_pages: state.cursor.has_more_pages(),
            status: state.sync_status(),
        }
    }

    pub async fn stats(&self) -> NotificationStats {
        self.state.read().await.stats
    }

    pub async fn get(&self, id: &str) -> Option<Notification> {
        self.state.read().await.store.get(id).cloned()
    }

    pub async fn unread_items(&self) -> Vec<Notification> {
        let state = self.state.read().await;
        state.store.iter().filter(|n| !n.is_read).cloned().collect()
    }

    /// 结束会话：清空副本，在途请求返回后被丢弃
    pub async fn end_session(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.sequencer.reset();
        state.clear();
        state.page_requests = 0;
        state.status = Default::default();
        info!(user_id = %self.identity.user_id, "Notification session ended");
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }
}

impl std::fmt::Debug for NotificationDomainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDomainService")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish()
    }
}
