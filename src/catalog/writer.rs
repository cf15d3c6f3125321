//! Catalog 批次写入器
//!
//! 单一所有者（`&mut self`），按行数阈值滚动到新的批次文件：
//! - 每次追加前检查当前批次是否已满，满则关闭并惰性打开下一序号
//! - `flush()` 只关闭当前文件，下一次 `write` 才会打开新文件
//! - 序号从 1 开始，同一 catalog 内永不复用（重新打开时从最大序号之后继续）

use std::borrow::Borrow;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::catalog::entry::{catalog_schema, CatalogEntry};
use crate::catalog::layout::CatalogLayout;
use crate::common::{BatchSeq, Result, SnapshotId};
use crate::config::CatalogConfig;
use crate::meta::RowSchema;
use crate::segment::{SegmentOptions, SegmentSummary, SegmentWriter};

/// `write_all` 的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: u64,
    pub skipped: u64,
}

// ── 当前批次 ──────────────────────────────────────────────────────────────────

/// 持有打开的文件句柄；滚动时整体 move 出写入器
struct ActiveBatch {
    seq:    BatchSeq,
    writer: SegmentWriter,
    rows:   usize,
}

impl ActiveBatch {
    fn open(layout: &CatalogLayout, seq: BatchSeq, schema: &RowSchema, options: SegmentOptions) -> Result<Self> {
        let path   = layout.batch_path(seq);
        let writer = SegmentWriter::create(&path, schema.clone(), options)?;
        debug!(seq, path = %path.display(), "catalog batch opened");
        Ok(Self { seq, writer, rows: 0 })
    }

    fn append(&mut self, entry: &CatalogEntry) -> Result<()> {
        self.writer.append_row(entry.to_values())?;
        self.rows += 1;
        Ok(())
    }

    fn should_rollover(&self, threshold: usize) -> bool {
        self.rows >= threshold
    }

    fn finish(self) -> Result<SegmentSummary> {
        self.writer.close()
    }
}

// ── CatalogWriter ─────────────────────────────────────────────────────────────

pub struct CatalogWriter {
    layout:          CatalogLayout,
    schema:          RowSchema,
    options:         SegmentOptions,
    flush_threshold: usize,
    active:          Option<ActiveBatch>,
    next_seq:        BatchSeq,
    total_written:   u64,
    batch_count:     u32,
    skipped:         u64,
}

impl CatalogWriter {
    /// 打开 `{base}/snapshot_{id}/catalog` 的写入器（目录不存在则创建）
    pub fn open(base: impl Into<PathBuf>, snapshot_id: SnapshotId, config: &CatalogConfig) -> Result<Self> {
        let layout = CatalogLayout::new(base, snapshot_id);
        std::fs::create_dir_all(layout.catalog_dir())?;
        let last = layout.max_seq()?;
        if last > 0 {
            info!(snapshot_id, last_seq = last, "continuing existing catalog");
        }
        Ok(Self {
            layout,
            schema:  catalog_schema(),
            options: SegmentOptions::default()
                .with_compression(config.compression)
                .with_block_rows(config.block_rows),
            flush_threshold: config.flush_threshold.max(1),
            active:          None,
            next_seq:        last + 1,
            total_written:   0,
            batch_count:     0,
            skipped:         0,
        })
    }

    /// 写入一条条目
    ///
    /// 返回 `Ok(false)` 表示条目缺少必填字段，已记录告警并跳过；
    /// 只有 I/O 错误会以 `Err` 返回。
    pub fn write(&mut self, entry: &CatalogEntry) -> Result<bool> {
        match entry.validate() {
            Ok(()) => {}
            Err(e) if e.is_validation() => {
                warn!(snapshot_id = self.layout.snapshot_id(), id = %entry.id, identifier = %entry.identifier,
                      error = %e, "skipping invalid catalog entry");
                self.skipped += 1;
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        if self.active.as_ref().is_some_and(|b| b.should_rollover(self.flush_threshold)) {
            self.finish_active()?;
        }
        if self.active.is_none() {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.active = Some(ActiveBatch::open(&self.layout, seq, &self.schema, self.options)?);
        }
        if let Some(batch) = self.active.as_mut() {
            batch.append(entry)?;
        }
        self.total_written += 1;
        Ok(true)
    }

    /// 批量写入；无效条目被跳过，不中断整批
    pub fn write_all<I>(&mut self, entries: I) -> Result<WriteSummary>
    where
        I: IntoIterator,
        I::Item: Borrow<CatalogEntry>,
    {
        let mut summary = WriteSummary::default();
        for entry in entries {
            if self.write(entry.borrow())? {
                summary.written += 1;
            } else {
                summary.skipped += 1;
            }
        }
        Ok(summary)
    }

    /// 关闭当前批次文件（不打开新文件）
    pub fn flush(&mut self) -> Result<()> {
        self.finish_active().map(|_| ())
    }

    pub fn close(mut self) -> Result<()> {
        self.finish_active()?;
        info!(
            snapshot_id = self.layout.snapshot_id(),
            written = self.total_written, skipped = self.skipped, batches = self.batch_count,
            "catalog writer closed"
        );
        Ok(())
    }

    fn finish_active(&mut self) -> Result<Option<SegmentSummary>> {
        let Some(batch) = self.active.take() else { return Ok(None) };
        let seq     = batch.seq;
        let summary = batch.finish()?;
        self.batch_count += 1;
        info!(snapshot_id = self.layout.snapshot_id(), seq, rows = summary.rows, bytes = summary.bytes,
              "catalog batch written");
        Ok(Some(summary))
    }

    /// 本写入器成功写入的条目数
    pub fn total_written(&self) -> u64 { self.total_written }
    /// 本写入器已完成的批次文件数
    pub fn batch_count(&self) -> u32 { self.batch_count }
    pub fn skipped(&self) -> u64 { self.skipped }
    pub fn layout(&self) -> &CatalogLayout { &self.layout }
}

impl Drop for CatalogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish_active() {
            error!(snapshot_id = self.layout.snapshot_id(), error = %e, "failed to finish catalog batch on drop");
        }
    }
}
