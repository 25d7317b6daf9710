//! 通知本地副本状态
//!
//! 副本、统计、游标与拉取序号器放在同一把锁后面，
//! 任何一次变更都在同一个临界区内同时更新记录与统计。

use bistro_core::{FetchSequencer, PageCursor, ReplicaStore, Result, SyncError};
use tracing::debug;

use crate::domain::model::{Notification, NotificationStats, SyncStatus};

/// 一次已完成的拉取
#[derive(Debug)]
pub struct PageLoad {
    pub page: u32,
    pub items: Vec<Notification>,
    pub meta: PageCursor,
    /// 首页加载/刷新：以结果整体替换副本
    pub replace: bool,
}

#[derive(Debug)]
pub struct NotificationReplica {
    pub store: ReplicaStore<Notification>,
    pub stats: NotificationStats,
    pub cursor: PageCursor,
    pub sequencer: FetchSequencer<PageLoad>,
    /// 已发起请求的最大页码
    pub highest_requested: u32,
    /// 在途的后续页请求数
    pub page_requests: usize,
    /// 副本被整体替换或清空的次数，回滚只作用于同一代
    pub generation: u64,
    pub status: SyncStatus,
    pub closed: bool,
}

impl NotificationReplica {
    pub fn new(limit: u32) -> Self {
        Self {
            store: ReplicaStore::new(),
            stats: NotificationStats::default(),
            cursor: PageCursor::empty(limit),
            sequencer: FetchSequencer::new(),
            highest_requested: 0,
            page_requests: 0,
            generation: 0,
            status: SyncStatus::default(),
            closed: false,
        }
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SyncError::SessionClosed);
        }
        Ok(())
    }

    /// 作废在途拉取，准备重新从第一页开始
    pub fn restart(&mut self, clear: bool) {
        self.sequencer.reset();
        self.highest_requested = 1;
        self.page_requests = 0;
        self.status.loading = true;
        self.status.loading_more = false;
        if clear {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.stats = NotificationStats::default();
        self.cursor = PageCursor::empty(self.cursor.limit);
        self.generation += 1;
    }

    /// 按发起顺序应用一页结果
    pub fn apply_load(&mut self, load: PageLoad) {
        if load.replace {
            self.store.replace_all(load.items);
            self.stats = NotificationStats::from_records(self.store.iter());
            self.cursor = PageCursor::empty(load.meta.limit);
            self.cursor.advance(load.meta);
            self.generation += 1;
            self.status.loading = false;
            self.status.last_error = None;
            return;
        }

        if load.page > self.cursor.page + 1 {
            // 前序页失败，本页稍后会被重新请求
            debug!(
                page = load.page,
                cursor_page = self.cursor.page,
                "Dropping non-contiguous notification page"
            );
            return;
        }

        let incoming: Vec<bool> = load.items.iter().map(|n| n.is_read).collect();
        let replaced = self.store.append_page(load.items);
        for (prior, is_read) in replaced.into_iter().zip(incoming) {
            match prior {
                Some(prior) => self.stats.on_read_changed(prior.is_read, is_read),
                None => self.stats.on_insert(is_read),
            }
        }
        self.cursor.advance(load.meta);
        self.status.last_error = None;
    }

    pub fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            loading_more: self.page_requests > 0,
            ..self.status.clone()
        }
    }
}
