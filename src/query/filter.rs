//! 聚合过滤条件：可选谓词的合取

use crate::common::{RuleId, SnapshotId};
use crate::fact::reader;
use crate::fact::row::FactRow;
use crate::predicate::Predicate;

/// 所有字段为 None 时匹配全部行；可作缓存键
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AggregationFilter {
    pub snapshot_id:     Option<SnapshotId>,
    pub identifier:      Option<String>,
    pub is_valid:        Option<bool>,
    pub record_is_valid: Option<bool>,
    pub is_transformed:  Option<bool>,
    /// 行的有效规则集合（is_valid 时为 {rule_id}）中须包含该规则
    pub valid_rule:      Option<RuleId>,
    /// 行的无效规则集合（!is_valid 时为 {rule_id}）中须包含该规则
    pub invalid_rule:    Option<RuleId>,
}

impl AggregationFilter {
    pub fn all() -> Self { Self::default() }

    pub fn snapshot(mut self, id: SnapshotId) -> Self {
        self.snapshot_id = Some(id); self
    }
    pub fn identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.trim().to_owned()); self
    }
    pub fn valid(mut self, v: bool) -> Self {
        self.is_valid = Some(v); self
    }
    pub fn record_valid(mut self, v: bool) -> Self {
        self.record_is_valid = Some(v); self
    }
    pub fn transformed(mut self, v: bool) -> Self {
        self.is_transformed = Some(v); self
    }
    pub fn with_valid_rule(mut self, rule: RuleId) -> Self {
        self.valid_rule = Some(rule); self
    }
    pub fn with_invalid_rule(mut self, rule: RuleId) -> Self {
        self.invalid_rule = Some(rule); self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 转为可下推到存储层的谓词（全部条件都可精确表达）；空过滤返回 None
    pub fn to_predicate(&self) -> Option<Predicate> {
        let mut preds = Vec::new();
        if let Some(id) = self.snapshot_id {
            preds.push(reader::snapshot_id_eq(id));
        }
        if let Some(identifier) = &self.identifier {
            preds.push(reader::identifier_eq(identifier));
        }
        if let Some(v) = self.is_valid {
            preds.push(reader::is_valid_eq(v));
        }
        if let Some(v) = self.record_is_valid {
            preds.push(reader::record_is_valid_eq(v));
        }
        if let Some(v) = self.is_transformed {
            preds.push(reader::is_transformed_eq(v));
        }
        if let Some(rule) = self.valid_rule {
            preds.push(reader::rule_id_eq(rule));
            preds.push(reader::is_valid_eq(true));
        }
        if let Some(rule) = self.invalid_rule {
            preds.push(reader::rule_id_eq(rule));
            preds.push(reader::is_valid_eq(false));
        }
        Predicate::and(preds)
    }

    pub fn matches(&self, row: &FactRow) -> bool {
        fn check<T: PartialEq>(want: &Option<T>, got: &T) -> bool {
            want.as_ref().map_or(true, |w| w == got)
        }
        check(&self.snapshot_id, &row.snapshot_id)
            && self.identifier.as_deref().map_or(true, |id| id == row.identifier)
            && check(&self.is_valid, &row.is_valid)
            && check(&self.record_is_valid, &row.record_is_valid)
            && check(&self.is_transformed, &row.is_transformed)
            && self.valid_rule.map_or(true, |r| row.is_valid && row.rule_id == r)
            && self.invalid_rule.map_or(true, |r| !row.is_valid && row.rule_id == r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rule_id: RuleId, is_valid: bool) -> FactRow {
        FactRow {
            id: "r1".into(), identifier: "oai:x:1".into(), snapshot_id: 3,
            origin: "o".into(), rule_id, is_valid,
            ..FactRow::default()
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = AggregationFilter::all();
        assert!(f.is_empty());
        assert!(f.matches(&row(1, true)));
        assert!(f.matches(&row(2, false)));
    }

    #[test]
    fn rule_membership_respects_row_validity() {
        let f = AggregationFilter::all().with_valid_rule(5);
        assert!(f.matches(&row(5, true)));
        assert!(!f.matches(&row(5, false)));
        assert!(!f.matches(&row(6, true)));

        let f = AggregationFilter::all().with_invalid_rule(5);
        assert!(f.matches(&row(5, false)));
        assert!(!f.matches(&row(5, true)));
    }

    #[test]
    fn scalar_predicates_conjoin() {
        let f = AggregationFilter::all().snapshot(3).identifier(" oai:x:1 ").valid(true);
        assert!(f.matches(&row(1, true)));
        assert!(!f.matches(&row(1, false)));
        assert!(!AggregationFilter::all().snapshot(4).matches(&row(1, true)));
        assert!(!AggregationFilter::all().transformed(true).matches(&row(1, true)));
    }

    #[test]
    fn pushdown_predicate_mirrors_filter() {
        assert_eq!(AggregationFilter::all().to_predicate(), None);
        let single = AggregationFilter::all().snapshot(3).to_predicate();
        assert_eq!(single, Some(reader::snapshot_id_eq(3)));
        let rule = AggregationFilter::all().with_invalid_rule(5).to_predicate();
        assert_eq!(rule, Some(Predicate::And(vec![reader::rule_id_eq(5), reader::is_valid_eq(false)])));
    }
}
