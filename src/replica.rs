//! 本地副本存储
//!
//! 按 id 去重、保持首次出现顺序的有序记录集合。
//! 新 id 追加在末尾；已存在的 id 原地替换（以最后一次拉取为准）。

use std::collections::HashMap;

/// 可被副本存储的记录
pub trait Replicated: Clone {
    fn replica_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ReplicaStore<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Replicated> ReplicaStore<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// 插入或原地替换，返回被替换的旧记录
    pub fn upsert(&mut self, record: T) -> Option<T> {
        match self.index.get(record.replica_id()) {
            Some(&pos) => Some(std::mem::replace(&mut self.items[pos], record)),
            None => {
                self.index
                    .insert(record.replica_id().to_string(), self.items.len());
                self.items.push(record);
                None
            }
        }
    }

    /// 合并一页记录，按输入顺序返回每条记录被替换的旧值
    pub fn append_page(&mut self, records: Vec<T>) -> Vec<Option<T>> {
        records.into_iter().map(|r| self.upsert(r)).collect()
    }

    /// 以权威结果整体替换
    pub fn replace_all(&mut self, records: Vec<T>) {
        self.clear();
        for record in records {
            self.upsert(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&pos) => self.items.get_mut(pos),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// 移除记录，返回其原位置与旧值
    pub fn remove(&mut self, id: &str) -> Option<(usize, T)> {
        let pos = self.index.remove(id)?;
        let record = self.items.remove(pos);
        self.reindex_from(pos);
        Some((pos, record))
    }

    /// 在指定位置插入（位置越界时追加）；id 已存在时不插入
    pub fn insert_at(&mut self, position: usize, record: T) -> bool {
        if self.contains(record.replica_id()) {
            return false;
        }
        let pos = position.min(self.items.len());
        self.items.insert(pos, record);
        self.reindex_from(pos);
        true
    }

    /// 稳定排序后重建索引
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.sort_by(compare);
        self.reindex_from(0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// 只读快照
    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, item) in self.items.iter().enumerate().skip(start) {
            self.index.insert(item.replica_id().to_string(), pos);
        }
    }
}

impl<T: Replicated> Default for ReplicaStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        value: u32,
    }

    impl Replicated for Row {
        fn replica_id(&self) -> &str {
            &self.id
        }
    }

    fn row(id: &str, value: u32) -> Row {
        Row {
            id: id.to_string(),
            value,
        }
    }

    fn ids(store: &ReplicaStore<Row>) -> Vec<String> {
        store.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_append_page_replaces_in_place() {
        let mut store = ReplicaStore::new();
        store.append_page(vec![row("a", 1), row("b", 1), row("c", 1)]);

        let previous = store.append_page(vec![row("b", 2), row("d", 1)]);

        assert_eq!(previous, vec![Some(row("b", 1)), None]);
        assert_eq!(ids(&store), vec!["a", "b", "c", "d"]);
        assert_eq!(store.get("b").unwrap().value, 2);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_duplicates_within_page_collapse() {
        let mut store = ReplicaStore::new();
        store.append_page(vec![row("a", 1), row("a", 2)]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().value, 2);
    }

    #[test]
    fn test_remove_and_insert_at_keep_index_consistent() {
        let mut store = ReplicaStore::new();
        store.append_page(vec![row("a", 1), row("b", 1), row("c", 1)]);

        let (pos, removed) = store.remove("b").unwrap();
        assert_eq!(pos, 1);
        assert_eq!(ids(&store), vec!["a", "c"]);
        assert_eq!(store.position("c"), Some(1));

        assert!(store.insert_at(pos, removed));
        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_eq!(store.position("c"), Some(2));
        assert!(!store.insert_at(0, row("a", 9)));
    }

    #[test]
    fn test_sort_rebuilds_index() {
        let mut store = ReplicaStore::new();
        store.append_page(vec![row("a", 3), row("b", 1), row("c", 2)]);
        store.sort_by(|x, y| x.value.cmp(&y.value));
        assert_eq!(ids(&store), vec!["b", "c", "a"]);
        assert_eq!(store.position("a"), Some(2));
        assert_eq!(store.get_mut("c").map(|r| r.value), Some(2));
    }
}
