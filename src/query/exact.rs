//! 精确查询引擎：分批流式扫描 + 进程内过滤

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::common::Result;
use crate::config::QueryConfig;
use crate::fact::reader::FactReader;
use crate::fact::row::FactRow;
use crate::query::cache::ResultCache;
use crate::query::filter::AggregationFilter;
use crate::query::pressure::{BatchSizer, MemoryPressure};
use crate::query::{AggregationResult, QueryMode, ValidationQuery};

pub struct ExactQueryEngine {
    cache:        Arc<ResultCache>,
    pressure:     Arc<dyn MemoryPressure>,
    config:       QueryConfig,
    scans:        AtomicU64,
    rows_scanned: AtomicU64,
}

impl ExactQueryEngine {
    /// 批大小参数不合法（min 为 0、min > max 等）时返回 `StoreError::Config`
    pub fn new(cache: Arc<ResultCache>, pressure: Arc<dyn MemoryPressure>, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { cache, pressure, config, scans: AtomicU64::new(0), rows_scanned: AtomicU64::new(0) })
    }

    /// 所有扫描累计从文件读出的行数（下推剪枝掉的块不计）
    pub fn rows_scanned(&self) -> u64 { self.rows_scanned.load(Ordering::Relaxed) }

    /// 按自适应批大小读取匹配过滤条件的行，逐批交给 `on_batch`
    ///
    /// 过滤条件先下推用于块剪枝，读回的行再逐行精确匹配。
    fn scan<F>(&self, file: &Path, filter: &AggregationFilter, initial_batch: usize, mut on_batch: F) -> Result<()>
    where
        F: FnMut(Vec<FactRow>) -> ControlFlow<()>,
    {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let predicate  = filter.to_predicate();
        let mut reader = FactReader::open(file, predicate.as_ref())?;
        let mut sizer  = BatchSizer::new(initial_batch, &self.config);
        if (self.config.min_batch as u64) < reader.max_block_rows() {
            debug!(file = %file.display(), min_batch = self.config.min_batch, block_rows = reader.max_block_rows(),
                   "batch floor below block size; resident rows bounded by block decode");
        }

        let mut batches = 0u64;
        loop {
            let want  = sizer.size();
            let batch = reader.read_with_limit(0, want)?;
            let got   = batch.len();
            if got == 0 {
                break;
            }
            batches += 1;
            let matching: Vec<FactRow> = batch.into_iter().filter(|r| filter.matches(r)).collect();
            if on_batch(matching).is_break() {
                break;
            }
            if got < want {
                break;
            }
            sizer.record(got, self.pressure.as_ref());
        }
        self.rows_scanned.fetch_add(reader.records_read(), Ordering::Relaxed);
        debug!(file = %file.display(), batches, rows = reader.records_read(),
               blocks_decoded = reader.blocks_decoded(), blocks_skipped = reader.blocks_skipped(),
               final_batch = sizer.size(), "exact scan finished");
        Ok(())
    }
}

impl ValidationQuery for ExactQueryEngine {
    fn mode(&self) -> QueryMode { QueryMode::Exact }

    fn count(&self, file: &Path, filter: &AggregationFilter) -> Result<u64> {
        let mut n = 0u64;
        self.scan(file, filter, self.config.max_batch, |rows| {
            n += rows.len() as u64;
            ControlFlow::Continue(())
        })?;
        Ok(n)
    }

    fn aggregate(&self, file: &Path, filter: &AggregationFilter) -> Result<Arc<AggregationResult>> {
        if let Some(hit) = self.cache.get(QueryMode::Exact, file, filter) {
            debug!(file = %file.display(), "exact aggregate served from cache");
            return Ok(hit);
        }
        let mut result = AggregationResult::default();
        self.scan(file, filter, self.config.max_batch, |rows| {
            rows.iter().for_each(|r| result.accumulate(r));
            ControlFlow::Continue(())
        })?;
        let result = Arc::new(result);
        self.cache.insert(QueryMode::Exact, file, filter.clone(), Arc::clone(&result));
        Ok(result)
    }

    fn page(&self, file: &Path, filter: &AggregationFilter, offset: usize, limit: usize) -> Result<Vec<FactRow>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut out  = Vec::with_capacity(limit.min(self.config.page_batch));
        let mut rank = 0usize;
        self.scan(file, filter, self.config.page_batch, |rows| {
            for row in rows {
                if rank >= offset {
                    out.push(row);
                    if out.len() == limit {
                        return ControlFlow::Break(());
                    }
                }
                rank += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    fn scan_count(&self) -> u64 { self.scans.load(Ordering::Relaxed) }
}
