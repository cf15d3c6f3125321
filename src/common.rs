//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

pub type SnapshotId = i64;
pub type RuleId     = i32;
pub type SchemaHash = u32;
/// Catalog 批次文件序号（从 1 开始，单个 catalog 内永不复用）
pub type BatchSeq   = u32;

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("segment I/O error: {0}")]
    SegmentIo(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("required field missing or blank: {0}")]
    MissingField(&'static str),
    #[error("invalid rule id '{key}' in record {record_id}")]
    InvalidRuleId { key: String, record_id: String },
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl StoreError {
    /// 校验类错误：记录日志后跳过当前条目，不向上传播
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::InvalidRuleId { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// 必填字符串校验：trim 后为空视为缺失
pub fn require(value: &str, field: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::MissingField(field));
    }
    Ok(())
}
