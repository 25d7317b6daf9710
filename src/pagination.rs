//! 分页游标

use serde::{Deserialize, Serialize};

/// 分页游标状态（page 从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub page: u32,
    #[serde(rename = "totalPages", alias = "total_pages")]
    pub total_pages: u32,
    pub limit: u32,
    pub total: u64,
}

impl PageCursor {
    /// 尚未加载任何页
    pub fn empty(limit: u32) -> Self {
        Self {
            page: 0,
            total_pages: 0,
            limit,
            total: 0,
        }
    }

    /// 非分页调用方的合成单页
    pub fn single(total: usize) -> Self {
        Self {
            page: 1,
            total_pages: 1,
            limit: total as u32,
            total: total as u64,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn is_loaded(&self) -> bool {
        self.page > 0
    }

    /// 以后端返回的元数据推进游标，保证 page <= total_pages
    pub fn advance(&mut self, meta: PageCursor) {
        let total_pages = meta.total_pages.max(1);
        self.total_pages = total_pages;
        self.limit = meta.limit;
        self.total = meta.total;
        self.page = self.page.max(meta.page).min(total_pages);
    }
}
