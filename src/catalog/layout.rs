//! Catalog 目录布局
//!
//! ```text
//! {base}/snapshot_{id}/catalog/oai_records_batch_000001.seg
//!                              oai_records_batch_000002.seg
//!                              ...
//! ```

use std::path::PathBuf;

use tracing::info;

use crate::common::{BatchSeq, Result, SnapshotId};
use crate::segment::SEGMENT_FILE_EXTENSION;

pub const FILE_PREFIX: &str = "oai_records_batch_";
/// 序号补零宽度，六位以内字典序与写入序一致
pub const SEQ_WIDTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLayout {
    base:        PathBuf,
    snapshot_id: SnapshotId,
}

impl CatalogLayout {
    pub fn new(base: impl Into<PathBuf>, snapshot_id: SnapshotId) -> Self {
        Self { base: base.into(), snapshot_id }
    }

    pub fn snapshot_id(&self) -> SnapshotId { self.snapshot_id }

    pub fn catalog_dir(&self) -> PathBuf {
        self.base
            .join(format!("snapshot_{}", self.snapshot_id))
            .join("catalog")
    }

    pub fn file_name(seq: BatchSeq) -> String {
        format!("{FILE_PREFIX}{seq:0width$}.{SEGMENT_FILE_EXTENSION}", width = SEQ_WIDTH)
    }

    pub fn batch_path(&self, seq: BatchSeq) -> PathBuf {
        self.catalog_dir().join(Self::file_name(seq))
    }

    /// 从文件名解析批次序号；不符合命名规则返回 None
    pub fn parse_seq(file_name: &str) -> Option<BatchSeq> {
        let digits = file_name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(SEGMENT_FILE_EXTENSION)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// 列出所有批次文件，按 (文件名长度, 文件名) 排序
    ///
    /// 目录不存在时返回空列表。
    pub fn list_batches(&self) -> Result<Vec<PathBuf>> {
        let dir = self.catalog_dir();
        let rd = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in rd {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if Self::parse_seq(name).is_some() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Ok(names.into_iter().map(|n| dir.join(n)).collect())
    }

    /// 当前最大的批次序号（无文件时为 0）
    pub fn max_seq(&self) -> Result<BatchSeq> {
        Ok(self.list_batches()?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).and_then(Self::parse_seq))
            .max()
            .unwrap_or(0))
    }

    /// 删除整个 catalog 目录（唯一的删除方式）
    pub fn delete_catalog(&self) -> Result<bool> {
        let dir = self.catalog_dir();
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(snapshot_id = self.snapshot_id, dir = %dir.display(), "catalog deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
