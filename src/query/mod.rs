//! 事实表查询
//!
//! 两种引擎实现同一接口：
//! - [`ExactQueryEngine`]       — 流式扫描所有行，自适应批大小，结果精确
//! - [`StatisticalQueryEngine`] — 只读块级元数据，按比例估算，不支持分页
//!
//! 两者共享注入的 [`ResultCache`]，键中带引擎模式，互不覆盖。

pub mod cache;
pub mod exact;
pub mod filter;
pub mod pressure;
pub mod statistical;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::common::{Result, RuleId};
use crate::fact::row::FactRow;

pub use cache::ResultCache;
pub use exact::ExactQueryEngine;
pub use filter::AggregationFilter;
pub use pressure::{BatchSizer, FixedPressure, MemoryPressure};
pub use statistical::StatisticalQueryEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryMode {
    Exact,
    Statistical,
}

/// 聚合结果；放入缓存后不再修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationResult {
    pub total_count:         u64,
    pub valid_count:         u64,
    pub invalid_count:       u64,
    pub transformed_count:   u64,
    pub valid_rule_counts:   BTreeMap<RuleId, u64>,
    pub invalid_rule_counts: BTreeMap<RuleId, u64>,
}

impl AggregationResult {
    pub fn accumulate(&mut self, row: &FactRow) {
        self.total_count += 1;
        if row.is_valid {
            self.valid_count += 1;
            *self.valid_rule_counts.entry(row.rule_id).or_insert(0) += 1;
        } else {
            self.invalid_count += 1;
            *self.invalid_rule_counts.entry(row.rule_id).or_insert(0) += 1;
        }
        if row.is_transformed {
            self.transformed_count += 1;
        }
    }
}

pub trait ValidationQuery {
    fn mode(&self) -> QueryMode;

    /// 满足过滤条件的行数
    fn count(&self, file: &Path, filter: &AggregationFilter) -> Result<u64>;

    /// 聚合统计；相同 (file, filter) 的重复调用直接返回缓存
    fn aggregate(&self, file: &Path, filter: &AggregationFilter) -> Result<Arc<AggregationResult>>;

    /// 按扫描顺序取第 `[offset, offset + limit)` 个匹配行
    fn page(&self, file: &Path, filter: &AggregationFilter, offset: usize, limit: usize) -> Result<Vec<FactRow>>;

    /// 已打开的存储扫描次数
    fn scan_count(&self) -> u64;
}
