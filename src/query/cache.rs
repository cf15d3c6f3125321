//! 聚合结果缓存
//!
//! 分段加锁的 DashMap；值为不可变的 `Arc<AggregationResult>`，
//! 读方永远看不到构建中的结果。未命中并发时可能重复计算，后写覆盖先写。
//! 不设容量上限，按文件失效或整体清空。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::query::filter::AggregationFilter;
use crate::query::{AggregationResult, QueryMode};

pub type CacheKey = (QueryMode, PathBuf, AggregationFilter);

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<CacheKey, Arc<AggregationResult>>,
}

impl ResultCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, mode: QueryMode, file: &Path, filter: &AggregationFilter) -> Option<Arc<AggregationResult>> {
        self.entries
            .get(&(mode, file.to_path_buf(), filter.clone()))
            .map(|e| Arc::clone(e.value()))
    }

    pub fn insert(&self, mode: QueryMode, file: &Path, filter: AggregationFilter, result: Arc<AggregationResult>) {
        self.entries.insert((mode, file.to_path_buf(), filter), result);
    }

    /// 删除某个文件的所有缓存项，返回删除数
    pub fn invalidate_file(&self, file: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, path, _), _| path != file);
        before - self.entries.len()
    }

    pub fn clear(&self) { self.entries.clear() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn cached_files(&self) -> Vec<PathBuf> {
        let files: BTreeSet<PathBuf> = self.entries.iter().map(|e| e.key().1.clone()).collect();
        files.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_separate_mode_file_and_filter() {
        let cache = ResultCache::new();
        let a = Path::new("/data/a.seg");
        let b = Path::new("/data/b.seg");
        let all = AggregationFilter::all();
        let valid = AggregationFilter::all().valid(true);

        let r = Arc::new(AggregationResult { total_count: 3, ..AggregationResult::default() });
        cache.insert(QueryMode::Exact, a, all.clone(), Arc::clone(&r));
        assert!(Arc::ptr_eq(&cache.get(QueryMode::Exact, a, &all).unwrap(), &r));
        assert!(cache.get(QueryMode::Statistical, a, &all).is_none());
        assert!(cache.get(QueryMode::Exact, a, &valid).is_none());

        cache.insert(QueryMode::Exact, a, valid, Arc::new(AggregationResult::default()));
        cache.insert(QueryMode::Statistical, b, all, Arc::new(AggregationResult::default()));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.cached_files(), vec![a.to_path_buf(), b.to_path_buf()]);

        assert_eq!(cache.invalidate_file(a), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
