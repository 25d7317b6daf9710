//! 拉取序号器
//!
//! 每次拉取在发起时领取单调递增的 seq；结果按发起顺序应用（重排缓冲），
//! 先返回的后发请求会被暂存，直到前序请求全部完成。
//! `reset` 推进 epoch，之前发起的所有请求在返回时被丢弃。

use std::collections::BTreeMap;

/// 拉取票据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub epoch: u64,
}

/// 完成结果
#[derive(Debug, PartialEq, Eq)]
pub enum Completion<T> {
    /// 票据属于已失效的 epoch，结果应丢弃
    Stale,
    /// 现在可以按发起顺序应用的结果（可能为空：仍在等待前序请求）
    Ready(Vec<T>),
}

#[derive(Debug)]
pub struct FetchSequencer<T> {
    epoch: u64,
    next_issue: u64,
    next_apply: u64,
    parked: BTreeMap<u64, Option<T>>,
}

impl<T> FetchSequencer<T> {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            next_issue: 0,
            next_apply: 0,
            parked: BTreeMap::new(),
        }
    }

    pub fn issue(&mut self) -> FetchTicket {
        let ticket = FetchTicket {
            seq: self.next_issue,
            epoch: self.epoch,
        };
        self.next_issue += 1;
        ticket
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// 登记一次拉取完成；`None` 表示失败，只释放顺位
    pub fn complete(&mut self, ticket: FetchTicket, result: Option<T>) -> Completion<T> {
        if !self.is_current(&ticket) || ticket.seq < self.next_apply {
            return Completion::Stale;
        }

        self.parked.insert(ticket.seq, result);

        let mut ready = Vec::new();
        while let Some(slot) = self.parked.remove(&self.next_apply) {
            self.next_apply += 1;
            if let Some(value) = slot {
                ready.push(value);
            }
        }
        Completion::Ready(ready)
    }

    /// 使所有在途请求失效
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.parked.clear();
        self.next_apply = self.next_issue;
    }

    /// 已发起但尚未应用的请求数（含暂存）
    pub fn in_flight(&self) -> usize {
        (self.next_issue - self.next_apply) as usize
    }

    /// 已返回但在等待前序请求的结果数
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl<T> Default for FetchSequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}
