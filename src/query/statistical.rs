//! 统计查询引擎：只读 Segment Footer 中的块元数据
//!
//! 行数精确；有效/无效/转换计数按配置比例估算，规则计数为空。
//! 耗时与块数成正比，与行数无关。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::Result;
use crate::config::EstimationRatios;
use crate::fact::reader::FactReader;
use crate::fact::row::FactRow;
use crate::query::cache::ResultCache;
use crate::query::filter::AggregationFilter;
use crate::query::{AggregationResult, QueryMode, ValidationQuery};
use crate::segment::BlockStats;

pub struct StatisticalQueryEngine {
    cache:  Arc<ResultCache>,
    ratios: EstimationRatios,
    scans:  AtomicU64,
}

impl StatisticalQueryEngine {
    pub fn new(cache: Arc<ResultCache>, ratios: EstimationRatios) -> Self {
        Self { cache, ratios, scans: AtomicU64::new(0) }
    }

    fn blocks(&self, file: &Path) -> Result<Vec<BlockStats>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let reader = FactReader::open(file, None)?;
        Ok(reader.block_statistics().to_vec())
    }
}

impl ValidationQuery for StatisticalQueryEngine {
    fn mode(&self) -> QueryMode { QueryMode::Statistical }

    /// 块行数之和，忽略过滤条件
    fn count(&self, file: &Path, _filter: &AggregationFilter) -> Result<u64> {
        Ok(self.blocks(file)?.iter().map(|b| b.row_count).sum())
    }

    fn aggregate(&self, file: &Path, filter: &AggregationFilter) -> Result<Arc<AggregationResult>> {
        if let Some(hit) = self.cache.get(QueryMode::Statistical, file, filter) {
            return Ok(hit);
        }
        let blocks = self.blocks(file)?;
        let mut result = AggregationResult::default();
        for block in &blocks {
            result.total_count       += block.row_count;
            result.valid_count       += self.ratios.valid.apply(block.row_count);
            result.invalid_count     += self.ratios.invalid.apply(block.row_count);
            result.transformed_count += self.ratios.transformed.apply(block.row_count);
        }
        debug!(file = %file.display(), blocks = blocks.len(), total = result.total_count, "statistical aggregate estimated");
        let result = Arc::new(result);
        self.cache.insert(QueryMode::Statistical, file, filter.clone(), Arc::clone(&result));
        Ok(result)
    }

    fn page(&self, file: &Path, _filter: &AggregationFilter, offset: usize, limit: usize) -> Result<Vec<FactRow>> {
        warn!(file = %file.display(), offset, limit, "pagination is not available on estimated statistics");
        Ok(Vec::new())
    }

    fn scan_count(&self) -> u64 { self.scans.load(Ordering::Relaxed) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactConfig, Ratio};
    use crate::fact::writer::FactWriter;
    use tempfile::TempDir;

    fn write_rows(path: &Path, n: usize) {
        let mut w = FactWriter::create(path, &FactConfig { block_rows: 7, ..FactConfig::default() }).unwrap();
        for i in 0..n {
            let row = FactRow {
                id: format!("r{i}"), identifier: format!("oai:x:{i}"), snapshot_id: 1,
                origin: "o".into(), rule_id: 1, is_valid: true,
                ..FactRow::default()
            };
            w.write_fact(&row).unwrap();
        }
        w.close().unwrap();
    }

    #[test]
    fn estimates_are_per_block_integer_fractions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.seg");
        write_rows(&path, 20);
        let e = StatisticalQueryEngine::new(Arc::new(ResultCache::new()), EstimationRatios::default());

        // 块行数 7, 7, 6
        let r = e.aggregate(&path, &AggregationFilter::all()).unwrap();
        assert_eq!(r.total_count, 20);
        assert_eq!(r.valid_count, 3 + 3 + 3);
        assert_eq!(r.transformed_count, 2 + 2 + 2);
        assert!(r.valid_rule_counts.is_empty());
        assert_eq!(e.count(&path, &AggregationFilter::all().valid(false)).unwrap(), 20);
        assert!(e.page(&path, &AggregationFilter::all(), 0, 10).unwrap().is_empty());
    }

    #[test]
    fn ratios_are_configurable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.seg");
        write_rows(&path, 14);
        let ratios = EstimationRatios { valid: Ratio::new(1, 1), ..EstimationRatios::default() };
        let e = StatisticalQueryEngine::new(Arc::new(ResultCache::new()), ratios);
        assert_eq!(e.aggregate(&path, &AggregationFilter::all()).unwrap().valid_count, 14);
    }
}
