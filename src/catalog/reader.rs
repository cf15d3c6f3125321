//! Catalog 流式读取器
//!
//! 打开时列出并排序全部批次文件；读取时一次只解码一个文件到内存，
//! 迭代完即丢弃，再打开下一个。游标是显式的三态状态机：
//!
//! ```text
//! Idle ──advance──▶ BatchLoaded(i, rows) ──advance──▶ BatchLoaded(i+1, rows)
//!   │                        │
//!   └────────advance─────────┴──────────▶ Exhausted
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::entry::{catalog_schema, CatalogEntry};
use crate::catalog::layout::CatalogLayout;
use crate::common::{Result, SnapshotId};
use crate::meta::RowSchema;
use crate::segment::SegmentReader;

enum ReaderState {
    Idle,
    BatchLoaded {
        file_index: usize,
        rows:       std::vec::IntoIter<CatalogEntry>,
    },
    Exhausted,
}

pub struct CatalogReader {
    layout:       CatalogLayout,
    schema:       RowSchema,
    files:        Vec<PathBuf>,
    state:        ReaderState,
    records_read: u64,
}

impl CatalogReader {
    /// 打开快照的 catalog；目录不存在或为空时读取器直接处于 Exhausted
    pub fn open(base: impl Into<PathBuf>, snapshot_id: SnapshotId) -> Result<Self> {
        let layout = CatalogLayout::new(base, snapshot_id);
        let files  = layout.list_batches()?;
        debug!(snapshot_id, files = files.len(), "catalog reader opened");
        let state = initial_state(&files);
        Ok(Self { layout, schema: catalog_schema(), files, state, records_read: 0 })
    }

    /// 下一条条目；全部文件读完返回 `Ok(None)`
    pub fn read_next(&mut self) -> Result<Option<CatalogEntry>> {
        loop {
            match &mut self.state {
                ReaderState::Exhausted => return Ok(None),
                ReaderState::BatchLoaded { rows, .. } => {
                    if let Some(entry) = rows.next() {
                        self.records_read += 1;
                        return Ok(Some(entry));
                    }
                }
                ReaderState::Idle => {}
            }
            self.advance()?;
        }
    }

    /// 丢弃当前批次并加载下一个文件；加载失败时停在 Exhausted
    fn advance(&mut self) -> Result<()> {
        let next = match std::mem::replace(&mut self.state, ReaderState::Exhausted) {
            ReaderState::Idle                           => 0,
            ReaderState::BatchLoaded { file_index, .. } => file_index + 1,
            ReaderState::Exhausted                      => return Ok(()),
        };
        let Some(path) = self.files.get(next) else { return Ok(()) };
        let rows = load_file(path, &self.schema)?;
        debug!(snapshot_id = self.layout.snapshot_id(), file_index = next, rows = rows.len(), "catalog batch loaded");
        self.state = ReaderState::BatchLoaded { file_index: next, rows: rows.into_iter() };
        Ok(())
    }

    /// 回到第一个文件，丢弃驻留批次
    pub fn reset(&mut self) {
        self.state        = initial_state(&self.files);
        self.records_read = 0;
    }

    /// 惰性条目序列；不可重启，重新遍历需先 `reset()`
    pub fn entries(&mut self) -> Entries<'_> {
        Entries { reader: self }
    }

    /// 从当前位置数到末尾
    pub fn count(&mut self) -> Result<u64> {
        let mut n = 0;
        for entry in self.entries() {
            entry?;
            n += 1;
        }
        Ok(n)
    }

    pub fn for_each<F: FnMut(CatalogEntry)>(&mut self, mut f: F) -> Result<()> {
        for entry in self.entries() {
            f(entry?);
        }
        Ok(())
    }

    pub fn records_read(&self) -> u64 { self.records_read }
    pub fn file_count(&self) -> usize { self.files.len() }
    pub fn files(&self) -> &[PathBuf] { &self.files }
    pub fn is_exhausted(&self) -> bool { matches!(self.state, ReaderState::Exhausted) }
}

fn initial_state(files: &[PathBuf]) -> ReaderState {
    if files.is_empty() { ReaderState::Exhausted } else { ReaderState::Idle }
}

fn load_file(path: &Path, schema: &RowSchema) -> Result<Vec<CatalogEntry>> {
    let mut reader = SegmentReader::open(path, None)?;
    schema.expect_same(reader.schema())?;
    let mut rows = Vec::with_capacity(reader.num_rows() as usize);
    while let Some(row) = reader.read_next()? {
        rows.push(CatalogEntry::from_values(&row)?);
    }
    Ok(rows)
}

// ── 迭代器视图 ────────────────────────────────────────────────────────────────

/// 借用读取器的惰性序列，出错后结束
pub struct Entries<'a> {
    reader: &'a mut CatalogReader,
}

impl Iterator for Entries<'_> {
    type Item = Result<CatalogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_next().transpose()
    }
}

impl<'a> IntoIterator for &'a mut CatalogReader {
    type Item     = Result<CatalogEntry>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Entries { reader: self }
    }
}
