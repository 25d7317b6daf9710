//! 乐观变更与回滚
//!
//! 每个变更在本地副本上立即生效，并返回可逆命令（受影响记录的原状态）。
//! 后端调用失败时通过 `revert` 精确恢复，统计按增量同步调整，不做全量扫描。

use std::collections::HashSet;

use bistro_core::{Result, SyncError};

use crate::domain::service::replica_state::NotificationReplica;
use crate::domain::model::Notification;

/// 变更的逆操作
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// (id, 变更前的 is_read)
    ReadFlags(Vec<(String, bool)>),
    /// 按删除顺序记录的 (删除时位置, 原记录)
    Removed(Vec<(usize, Notification)>),
}

/// 设置单条已读/未读；目标已处于该状态时返回 `None`（幂等，无需后端调用）
pub fn set_read(state: &mut NotificationReplica, id: &str, is_read: bool) -> Result<Option<Undo>> {
    let record = state
        .store
        .get_mut(id)
        .ok_or_else(|| SyncError::not_found("notification", id))?;
    if record.is_read == is_read {
        return Ok(None);
    }

    let was_read = record.is_read;
    record.is_read = is_read;
    state.stats.on_read_changed(was_read, is_read);
    Ok(Some(Undo::ReadFlags(vec![(id.to_string(), was_read)])))
}

/// 全部标记已读；只记录原本未读的记录
pub fn mark_all_read(state: &mut NotificationReplica) -> Undo {
    let mut flipped = Vec::new();
    for record in state.store.iter_mut() {
        if !record.is_read {
            record.is_read = true;
            flipped.push((record.id.clone(), false));
        }
    }
    state.stats.on_all_read();
    Undo::ReadFlags(flipped)
}

pub fn delete(state: &mut NotificationReplica, id: &str) -> Result<Undo> {
    let (position, record) = state
        .store
        .remove(id)
        .ok_or_else(|| SyncError::not_found("notification", id))?;
    state.stats.on_remove(record.is_read);
    Ok(Undo::Removed(vec![(position, record)]))
}

/// 批量删除；本地不存在的 id 被忽略。返回实际删除的 id 与逆操作
pub fn delete_many(state: &mut NotificationReplica, ids: &[String]) -> (Vec<String>, Undo) {
    let mut seen = HashSet::new();
    let mut removed_ids = Vec::new();
    let mut removed = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        if let Some((position, record)) = state.store.remove(id) {
            state.stats.on_remove(record.is_read);
            removed_ids.push(record.id.clone());
            removed.push((position, record));
        }
    }
    (removed_ids, Undo::Removed(removed))
}

/// 恢复变更前状态；已被后续拉取或变更覆盖的记录保持不动
pub fn revert(state: &mut NotificationReplica, undo: Undo) -> usize {
    let mut restored = 0;
    match undo {
        Undo::ReadFlags(flags) => {
            for (id, was_read) in flags {
                if let Some(record) = state.store.get_mut(&id) {
                    if record.is_read != was_read {
                        record.is_read = was_read;
                        state.stats.on_read_changed(!was_read, was_read);
                        restored += 1;
                    }
                }
            }
        }
        Undo::Removed(records) => {
            for (position, record) in records.into_iter().rev() {
                let is_read = record.is_read;
                if state.store.insert_at(position, record) {
                    state.stats.on_insert(is_read);
                    restored += 1;
                }
            }
        }
    }
    restored
}
