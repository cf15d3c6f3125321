//! 事实表读取器（支持谓词下推）

use std::ops::ControlFlow;
use std::path::Path;

use crate::common::{Result, RuleId, SnapshotId};
use crate::fact::row::{fact_schema, FactRow};
use crate::field_type::Value;
use crate::predicate::Predicate;
use crate::segment::{BlockStats, SegmentReader};

pub struct FactReader {
    inner:        SegmentReader,
    records_read: u64,
}

impl FactReader {
    pub fn open(path: &Path, predicate: Option<&Predicate>) -> Result<Self> {
        let inner = SegmentReader::open(path, predicate)?;
        fact_schema().expect_same(inner.schema())?;
        Ok(Self { inner, records_read: 0 })
    }

    pub fn read_next(&mut self) -> Result<Option<FactRow>> {
        match self.inner.read_next()? {
            Some(row) => {
                self.records_read += 1;
                FactRow::from_values(&row).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 逐行回调；回调返回 `Break` 时提前结束
    pub fn stream<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(FactRow) -> ControlFlow<()>,
    {
        while let Some(row) = self.read_next()? {
            if f(row).is_break() {
                break;
            }
        }
        Ok(())
    }

    pub fn read_all(&mut self) -> Result<Vec<FactRow>> {
        let mut out = Vec::new();
        while let Some(row) = self.read_next()? {
            out.push(row);
        }
        Ok(out)
    }

    /// 从当前位置跳过 `offset` 行，再读取至多 `limit` 行
    pub fn read_with_limit(&mut self, offset: usize, limit: usize) -> Result<Vec<FactRow>> {
        for _ in 0..offset {
            if self.inner.read_next()?.is_none() {
                return Ok(Vec::new());
            }
            self.records_read += 1;
        }
        let mut out = Vec::with_capacity(limit.min(4096));
        while out.len() < limit {
            match self.read_next()? {
                Some(row) => out.push(row),
                None      => break,
            }
        }
        Ok(out)
    }

    pub fn count(&mut self) -> Result<u64> {
        let mut n = 0;
        while self.inner.read_next()?.is_some() {
            n += 1;
        }
        self.records_read += n;
        Ok(n)
    }

    pub fn block_statistics(&self) -> &[BlockStats] { self.inner.block_statistics() }
    pub fn num_rows(&self) -> u64 { self.inner.num_rows() }
    pub fn blocks_skipped(&self) -> usize { self.inner.blocks_skipped() }
    pub fn blocks_decoded(&self) -> usize { self.inner.blocks_decoded() }
    pub fn max_block_rows(&self) -> u64 { self.inner.max_block_rows() }
    /// 已从文件中读出（含被 offset 跳过）的行数
    pub fn records_read(&self) -> u64 { self.records_read }
}

// ── 常用谓词 ──────────────────────────────────────────────────────────────────

pub fn snapshot_id_eq(id: SnapshotId) -> Predicate {
    Predicate::eq("snapshot_id", Value::Int64(id))
}
pub fn is_valid_eq(v: bool) -> Predicate {
    Predicate::eq("is_valid", Value::Bool(v))
}
pub fn record_is_valid_eq(v: bool) -> Predicate {
    Predicate::eq("record_is_valid", Value::Bool(v))
}
pub fn is_transformed_eq(v: bool) -> Predicate {
    Predicate::eq("is_transformed", Value::Bool(v))
}
pub fn rule_id_eq(rule: RuleId) -> Predicate {
    Predicate::eq("rule_id", Value::Int32(rule))
}
pub fn rule_id_in(rules: &[RuleId]) -> Predicate {
    Predicate::in_list("rule_id", rules.iter().map(|r| Value::Int32(*r)).collect())
}
pub fn network_eq(network: &str) -> Predicate {
    Predicate::eq("network", Value::string(network))
}
pub fn identifier_eq(identifier: &str) -> Predicate {
    Predicate::eq("identifier", Value::string(identifier))
}
