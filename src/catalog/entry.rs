//! Catalog 条目与行 schema

use crate::common::{require, Result, StoreError};
use crate::field_type::{ColumnMeta, EncodingType, FieldType, Value};
use crate::meta::RowSchema;

pub const CATALOG_SCHEMA_NAME: &str = "oai_record_catalog";

/// Catalog 行 schema：五列全部必填；哈希列逐行唯一，用 Plain 编码
pub fn catalog_schema() -> RowSchema {
    RowSchema::new(CATALOG_SCHEMA_NAME, vec![
        ColumnMeta::new(0, "id", FieldType::Bytes).with_encoding(EncodingType::Plain),
        ColumnMeta::new(1, "identifier", FieldType::Bytes),
        ColumnMeta::new(2, "datestamp", FieldType::Int64),
        ColumnMeta::new(3, "content_hash", FieldType::Bytes).without_bloom()
            .with_encoding(EncodingType::Plain),
        ColumnMeta::new(4, "deleted", FieldType::Bool),
    ])
}

/// 一条采集记录的身份与来源信息，写入后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogEntry {
    /// 内容哈希，唯一键
    pub id:           String,
    /// 源系统标识符（跨采集不保证唯一）
    pub identifier:   String,
    /// 源端最后修改时间（毫秒）
    pub datestamp:    i64,
    pub content_hash: String,
    /// 删除标记（墓碑）
    pub deleted:      bool,
}

impl CatalogEntry {
    pub fn new(
        id:           impl Into<String>,
        identifier:   impl Into<String>,
        datestamp:    i64,
        content_hash: impl Into<String>,
        deleted:      bool,
    ) -> Self {
        Self {
            id: id.into(),
            identifier: identifier.into(),
            datestamp,
            content_hash: content_hash.into(),
            deleted,
        }
    }

    /// 字符串字段 trim 后不得为空
    pub fn validate(&self) -> Result<()> {
        require(&self.id, "id")?;
        require(&self.identifier, "identifier")?;
        require(&self.content_hash, "content_hash")
    }

    pub(crate) fn to_values(&self) -> Vec<Value> {
        vec![
            Value::string(self.id.trim()),
            Value::string(self.identifier.trim()),
            Value::Int64(self.datestamp),
            Value::string(self.content_hash.trim()),
            Value::Bool(self.deleted),
        ]
    }

    pub(crate) fn from_values(row: &[Value]) -> Result<Self> {
        let text = |i: usize, name: &str| -> Result<String> {
            row.get(i)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| StoreError::SchemaMismatch(format!("catalog column {name} is not text")))
        };
        let datestamp = row.get(2).and_then(Value::as_i64)
            .ok_or_else(|| StoreError::SchemaMismatch("catalog column datestamp is not int64".into()))?;
        let deleted = row.get(4).and_then(Value::as_bool)
            .ok_or_else(|| StoreError::SchemaMismatch("catalog column deleted is not bool".into()))?;
        Ok(Self {
            id:           text(0, "id")?,
            identifier:   text(1, "identifier")?,
            datestamp,
            content_hash: text(3, "content_hash")?,
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_string_fields_are_missing() {
        let ok = CatalogEntry::new("h1", "oai:x:1", 1_700_000_000_000, "c1", false);
        assert!(ok.validate().is_ok());

        let mut e = ok.clone();
        e.identifier = "  ".into();
        assert!(matches!(e.validate(), Err(StoreError::MissingField("identifier"))));
        let mut e = ok;
        e.content_hash.clear();
        assert!(matches!(e.validate(), Err(StoreError::MissingField("content_hash"))));
    }

    #[test]
    fn values_are_trimmed_and_decoded_back() {
        let e = CatalogEntry::new(" h1 ", "oai:x:1\n", -5, "c1", true);
        let row = e.to_values();
        catalog_schema().check_row(&row).unwrap();
        let back = CatalogEntry::from_values(&row).unwrap();
        assert_eq!(back, CatalogEntry::new("h1", "oai:x:1", -5, "c1", true));
    }
}
