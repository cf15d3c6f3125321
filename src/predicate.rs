//! 列谓词下推
//!
//! 谓词按列名构造，打开 Segment 时绑定到列下标：
//! - 块级：用 zone map / null_count / BloomFilter 判断整块能否跳过
//! - 行级：对解码后的行逐一求值

use crate::common::{Result, StoreError};
use crate::field_type::Value;
use crate::meta::RowSchema;
use crate::segment::BlockStats;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: Value) -> Self {
        Self::Eq(column.into(), value)
    }
    pub fn in_list(column: &str, values: Vec<Value>) -> Self {
        Self::In(column.into(), values)
    }

    /// 合取；单个谓词直接返回，空列表返回 None（不过滤）
    pub fn and(mut preds: Vec<Predicate>) -> Option<Self> {
        match preds.len() {
            0 => None,
            1 => preds.pop(),
            _ => Some(Self::And(preds)),
        }
    }

    pub(crate) fn bind(&self, schema: &RowSchema) -> Result<BoundPredicate> {
        let check = |col: usize, v: &Value| -> Result<()> {
            let meta = &schema.columns[col];
            if v.is_null() || meta.accepts(v) {
                Ok(())
            } else {
                Err(StoreError::SchemaMismatch(format!(
                    "predicate value {v:?} does not fit column {} ({:?})",
                    meta.name, meta.field_type
                )))
            }
        };
        Ok(match self {
            Self::Eq(name, v) => {
                let col = schema.index_of(name)?;
                check(col, v)?;
                BoundPredicate::Eq(col, v.clone())
            }
            Self::In(name, vs) => {
                let col = schema.index_of(name)?;
                for v in vs {
                    check(col, v)?;
                }
                BoundPredicate::In(col, vs.clone())
            }
            Self::IsNull(name) => BoundPredicate::Eq(schema.index_of(name)?, Value::Null),
            Self::And(ps) => BoundPredicate::And(
                ps.iter().map(|p| p.bind(schema)).collect::<Result<_>>()?,
            ),
            Self::Or(ps) => BoundPredicate::Or(
                ps.iter().map(|p| p.bind(schema)).collect::<Result<_>>()?,
            ),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) enum BoundPredicate {
    Eq(usize, Value),
    In(usize, Vec<Value>),
    And(Vec<BoundPredicate>),
    Or(Vec<BoundPredicate>),
}

impl BoundPredicate {
    /// 块内是否可能存在满足谓词的行（保守：false 表示一定不存在）
    pub fn may_match(&self, block: &BlockStats) -> bool {
        match self {
            Self::Eq(col, v)  => block_may_contain(block, *col, v),
            Self::In(col, vs) => vs.iter().any(|v| block_may_contain(block, *col, v)),
            Self::And(ps)     => ps.iter().all(|p| p.may_match(block)),
            Self::Or(ps)      => ps.iter().any(|p| p.may_match(block)),
        }
    }

    pub fn matches(&self, row: &[Value]) -> bool {
        match self {
            Self::Eq(col, v)  => row.get(*col) == Some(v),
            Self::In(col, vs) => row.get(*col).map(|x| vs.contains(x)).unwrap_or(false),
            Self::And(ps)     => ps.iter().all(|p| p.matches(row)),
            Self::Or(ps)      => ps.iter().any(|p| p.matches(row)),
        }
    }
}

fn block_may_contain(block: &BlockStats, col: usize, v: &Value) -> bool {
    let Some(column) = block.columns.get(col) else { return true };
    if !column.stats.may_contain(v) {
        return false;
    }
    match (&column.bloom, v.is_null()) {
        (Some(bf), false) => bf.may_contain(&v.to_sort_key()),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::{ColumnMeta, FieldType};

    fn schema() -> RowSchema {
        RowSchema::new("t", vec![
            ColumnMeta::new(0, "rule_id", FieldType::Int32),
            ColumnMeta::new(1, "network", FieldType::Bytes).nullable(),
        ])
    }

    #[test]
    fn and_or_collapse_trivial_lists() {
        assert_eq!(Predicate::and(vec![]), None);
        let single = Predicate::eq("rule_id", Value::Int32(1));
        assert_eq!(Predicate::and(vec![single.clone()]), Some(single));
    }

    #[test]
    fn row_evaluation() {
        let p = Predicate::And(vec![
            Predicate::in_list("rule_id", vec![Value::Int32(1), Value::Int32(2)]),
            Predicate::Or(vec![
                Predicate::eq("network", Value::string("BR")),
                Predicate::IsNull("network".into()),
            ]),
        ])
        .bind(&schema())
        .unwrap();
        assert!(p.matches(&[Value::Int32(2), Value::string("BR")]));
        assert!(p.matches(&[Value::Int32(1), Value::Null]));
        assert!(!p.matches(&[Value::Int32(3), Value::string("BR")]));
        assert!(!p.matches(&[Value::Int32(1), Value::string("AR")]));
    }

    #[test]
    fn binding_checks_columns_and_types() {
        let s = schema();
        assert!(matches!(
            Predicate::eq("nope", Value::Int32(1)).bind(&s),
            Err(StoreError::UnknownColumn(_))
        ));
        assert!(matches!(
            Predicate::eq("rule_id", Value::Int64(1)).bind(&s),
            Err(StoreError::SchemaMismatch(_))
        ));
    }
}
