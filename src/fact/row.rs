//! 事实行：(记录, 规则, 值, 有效性) 一行

use tracing::warn;

use crate::common::{require, Result, RuleId, SnapshotId, StoreError};
use crate::field_type::{ColumnMeta, EncodingType, FieldType, Value};
use crate::meta::RowSchema;

pub const FACT_SCHEMA_NAME: &str = "validation_fact";
/// 单个值的最大字符数，超出部分截断
pub const MAX_VALUE_CHARS: usize = 16_384;

// 列下标，与 fact_schema() 顺序一致
pub(crate) const COL_ID: usize              = 0;
pub(crate) const COL_IDENTIFIER: usize      = 1;
pub(crate) const COL_SNAPSHOT_ID: usize     = 2;
pub(crate) const COL_ORIGIN: usize          = 3;
pub(crate) const COL_NETWORK: usize         = 4;
pub(crate) const COL_REPOSITORY: usize      = 5;
pub(crate) const COL_INSTITUTION: usize     = 6;
pub(crate) const COL_RULE_ID: usize         = 7;
pub(crate) const COL_VALUE: usize           = 8;
pub(crate) const COL_IS_VALID: usize        = 9;
pub(crate) const COL_RECORD_IS_VALID: usize = 10;
pub(crate) const COL_IS_TRANSFORMED: usize  = 11;
pub(crate) const COL_METADATA_PREFIX: usize = 12;
pub(crate) const COL_SET_SPEC: usize        = 13;

/// `id` 与 `value` 基本不重复，字典编码无收益，改用 Plain
pub fn fact_schema() -> RowSchema {
    RowSchema::new(FACT_SCHEMA_NAME, vec![
        ColumnMeta::new(0, "id", FieldType::Bytes).with_encoding(EncodingType::Plain),
        ColumnMeta::new(1, "identifier", FieldType::Bytes),
        ColumnMeta::new(2, "snapshot_id", FieldType::Int64),
        ColumnMeta::new(3, "origin", FieldType::Bytes).without_bloom(),
        ColumnMeta::new(4, "network", FieldType::Bytes).nullable(),
        ColumnMeta::new(5, "repository", FieldType::Bytes).nullable(),
        ColumnMeta::new(6, "institution", FieldType::Bytes).nullable(),
        ColumnMeta::new(7, "rule_id", FieldType::Int32),
        ColumnMeta::new(8, "value", FieldType::Bytes).nullable().without_bloom()
            .with_encoding(EncodingType::Plain),
        ColumnMeta::new(9, "is_valid", FieldType::Bool),
        ColumnMeta::new(10, "record_is_valid", FieldType::Bool),
        ColumnMeta::new(11, "is_transformed", FieldType::Bool),
        ColumnMeta::new(12, "metadata_prefix", FieldType::Bytes).nullable(),
        ColumnMeta::new(13, "set_spec", FieldType::Bytes).nullable(),
    ])
}

/// trim；空串视为 None；超长截断到字符边界
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.char_indices().nth(MAX_VALUE_CHARS) {
        Some((cut, _)) => Some(trimmed[..cut].to_owned()),
        None           => Some(trimmed.to_owned()),
    }
}

/// 解析规则键；失败时记录告警并返回 None
pub fn parse_rule_id(key: &str, record_id: &str) -> Option<RuleId> {
    match key.trim().parse::<RuleId>() {
        Ok(id) => Some(id),
        Err(_) => {
            let err = StoreError::InvalidRuleId { key: key.into(), record_id: record_id.into() };
            warn!(error = %err, "skipping rule entry");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FactRow {
    pub id:              String,
    pub identifier:      String,
    pub snapshot_id:     SnapshotId,
    pub origin:          String,
    pub network:         Option<String>,
    pub repository:      Option<String>,
    pub institution:     Option<String>,
    pub rule_id:         RuleId,
    pub value:           Option<String>,
    /// 本行规则的有效性
    pub is_valid:        bool,
    /// 源记录整体的有效性
    pub record_is_valid: bool,
    pub is_transformed:  bool,
    pub metadata_prefix: Option<String>,
    pub set_spec:        Option<String>,
}

impl FactRow {
    pub fn validate(&self) -> Result<()> {
        require(&self.id, "id")?;
        require(&self.identifier, "identifier")?;
        require(&self.origin, "origin")
    }

    pub(crate) fn to_values(&self) -> Vec<Value> {
        vec![
            Value::string(self.id.trim()),
            Value::string(self.identifier.trim()),
            Value::Int64(self.snapshot_id),
            Value::string(self.origin.trim()),
            Value::optional_string(self.network.as_deref()),
            Value::optional_string(self.repository.as_deref()),
            Value::optional_string(self.institution.as_deref()),
            Value::Int32(self.rule_id),
            self.value.as_deref().and_then(normalize).map_or(Value::Null, |v| Value::string(&v)),
            Value::Bool(self.is_valid),
            Value::Bool(self.record_is_valid),
            Value::Bool(self.is_transformed),
            Value::optional_string(self.metadata_prefix.as_deref()),
            Value::optional_string(self.set_spec.as_deref()),
        ]
    }

    pub(crate) fn from_values(row: &[Value]) -> Result<Self> {
        let col = |i: usize| row.get(i).ok_or_else(|| {
            StoreError::SchemaMismatch(format!("fact row has {} columns, expected 14", row.len()))
        });
        let text = |i: usize| -> Result<String> {
            col(i)?.as_str().map(str::to_owned).ok_or_else(|| {
                StoreError::SchemaMismatch(format!("fact column {i} is not text"))
            })
        };
        let opt_text = |i: usize| -> Result<Option<String>> {
            Ok(col(i)?.as_str().map(str::to_owned))
        };
        let flag = |i: usize| -> Result<bool> {
            col(i)?.as_bool().ok_or_else(|| {
                StoreError::SchemaMismatch(format!("fact column {i} is not bool"))
            })
        };
        Ok(Self {
            id:              text(COL_ID)?,
            identifier:      text(COL_IDENTIFIER)?,
            snapshot_id:     col(COL_SNAPSHOT_ID)?.as_i64().ok_or_else(|| {
                StoreError::SchemaMismatch("fact column snapshot_id is not int64".into())
            })?,
            origin:          text(COL_ORIGIN)?,
            network:         opt_text(COL_NETWORK)?,
            repository:      opt_text(COL_REPOSITORY)?,
            institution:     opt_text(COL_INSTITUTION)?,
            rule_id:         col(COL_RULE_ID)?.as_i32().ok_or_else(|| {
                StoreError::SchemaMismatch("fact column rule_id is not int32".into())
            })?,
            value:           opt_text(COL_VALUE)?,
            is_valid:        flag(COL_IS_VALID)?,
            record_is_valid: flag(COL_RECORD_IS_VALID)?,
            is_transformed:  flag(COL_IS_TRANSFORMED)?,
            metadata_prefix: opt_text(COL_METADATA_PREFIX)?,
            set_spec:        opt_text(COL_SET_SPEC)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_truncates_on_char_boundary() {
        assert_eq!(normalize("  "), None);
        assert_eq!(normalize(" en "), Some("en".into()));
        let long: String = "é".repeat(MAX_VALUE_CHARS + 10);
        let cut = normalize(&long).unwrap();
        assert_eq!(cut.chars().count(), MAX_VALUE_CHARS);
    }

    #[test]
    fn stored_value_is_normalized() {
        let row = FactRow {
            id: "r1".into(), identifier: "oai:x:1".into(), origin: "o".into(),
            value: Some(format!("  {}", "x".repeat(MAX_VALUE_CHARS + 5))),
            ..FactRow::default()
        };
        let values = row.to_values();
        assert_eq!(values[COL_VALUE].as_str().map(|v| v.chars().count()), Some(MAX_VALUE_CHARS));
        let blank = FactRow { value: Some("   ".into()), ..row };
        assert_eq!(blank.to_values()[COL_VALUE], Value::Null);
    }

    #[test]
    fn identifying_columns_use_plain_encoding() {
        let schema = fact_schema();
        assert_eq!(schema.columns[COL_ID].encoding, EncodingType::Plain);
        assert_eq!(schema.columns[COL_VALUE].encoding, EncodingType::Plain);
        assert_eq!(schema.columns[COL_NETWORK].encoding, EncodingType::Dictionary);
    }

    #[test]
    fn rule_keys_parse_after_trim() {
        assert_eq!(parse_rule_id(" 12 ", "r"), Some(12));
        assert_eq!(parse_rule_id("-3", "r"), Some(-3));
        assert_eq!(parse_rule_id("dc.title", "r"), None);
        assert_eq!(parse_rule_id("99999999999", "r"), None);
    }

    #[test]
    fn blank_optionals_are_stored_as_null() {
        let row = FactRow {
            id: "r1".into(), identifier: "oai:x:1".into(), snapshot_id: 7, origin: "http://x".into(),
            network: Some("  ".into()), repository: Some(" Repo ".into()),
            rule_id: 4, value: None, is_valid: true, record_is_valid: false,
            ..FactRow::default()
        };
        let values = row.to_values();
        fact_schema().check_row(&values).unwrap();
        assert_eq!(values[COL_NETWORK], Value::Null);

        let back = FactRow::from_values(&values).unwrap();
        assert_eq!(back.network, None);
        assert_eq!(back.repository.as_deref(), Some("Repo"));
        assert_eq!(back.rule_id, 4);
        assert!(!back.record_is_valid);
    }

    #[test]
    fn required_strings_must_be_present() {
        let row = FactRow { id: "r1".into(), identifier: "i".into(), ..FactRow::default() };
        assert!(matches!(row.validate(), Err(StoreError::MissingField("origin"))));
    }
}
