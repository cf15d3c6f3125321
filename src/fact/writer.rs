//! 事实表写入器：观测展开 + 去重后写入单个 Segment 文件

use std::borrow::Borrow;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::common::Result;
use crate::config::FactConfig;
use crate::fact::observation::ValidationObservation;
use crate::fact::row::{fact_schema, FactRow};
use crate::segment::{SegmentOptions, SegmentSummary, SegmentWriter};

pub struct FactWriter {
    writer:       SegmentWriter,
    rows_written: u64,
    skipped:      u64,
}

impl FactWriter {
    /// 创建（覆盖）事实文件
    pub fn create(path: &Path, config: &FactConfig) -> Result<Self> {
        let options = SegmentOptions::default()
            .with_compression(config.compression)
            .with_block_rows(config.block_rows)
            .overwrite();
        let writer = SegmentWriter::create(path, fact_schema(), options)?;
        Ok(Self { writer, rows_written: 0, skipped: 0 })
    }

    /// 展开一条观测并写入；返回写入的行数（无效观测返回 0）
    pub fn write_observation(&mut self, obs: &ValidationObservation) -> Result<usize> {
        match obs.validate() {
            Ok(()) => {}
            Err(e) if e.is_validation() => {
                warn!(id = %obs.id, identifier = %obs.identifier, error = %e, "skipping invalid observation");
                self.skipped += 1;
                return Ok(0);
            }
            Err(e) => return Err(e),
        }
        let rows = obs.explode();
        for row in &rows {
            self.append(row)?;
        }
        debug!(id = %obs.id, rows = rows.len(), "observation exploded");
        Ok(rows.len())
    }

    /// 直接写入已构造好的事实行
    ///
    /// `value` 与展开路径一样经过 [`normalize`](crate::fact::row::normalize)（trim、空串转 None、超长截断）。
    pub fn write_fact(&mut self, row: &FactRow) -> Result<bool> {
        match row.validate() {
            Ok(()) => {}
            Err(e) if e.is_validation() => {
                warn!(id = %row.id, rule_id = row.rule_id, error = %e, "skipping invalid fact row");
                self.skipped += 1;
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        self.append(row)?;
        Ok(true)
    }

    pub fn write_observations<I>(&mut self, observations: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Borrow<ValidationObservation>,
    {
        let mut rows = 0u64;
        for obs in observations {
            rows += self.write_observation(obs.borrow())? as u64;
        }
        Ok(rows)
    }

    pub fn write_facts<I>(&mut self, facts: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Borrow<FactRow>,
    {
        let mut rows = 0u64;
        for row in facts {
            if self.write_fact(row.borrow())? {
                rows += 1;
            }
        }
        Ok(rows)
    }

    fn append(&mut self, row: &FactRow) -> Result<()> {
        self.writer.append_row(row.to_values())?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 { self.rows_written }
    /// 被跳过的观测/行数
    pub fn skipped(&self) -> u64 { self.skipped }

    pub fn close(self) -> Result<SegmentSummary> {
        let summary = self.writer.close()?;
        info!(path = %summary.path.display(), rows = summary.rows, blocks = summary.blocks,
              skipped = self.skipped, "fact file written");
        Ok(summary)
    }
}
