//! 宽格式校验观测：一条采集记录一行，携带 规则键 → 值列表 两张表

use std::collections::{BTreeMap, HashSet};

use crate::common::{require, Result, RuleId, SnapshotId};
use crate::fact::row::{normalize, parse_rule_id, FactRow};

pub type OccurrenceMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationObservation {
    pub id:              String,
    pub identifier:      String,
    pub snapshot_id:     SnapshotId,
    pub origin:          String,
    pub network:         Option<String>,
    pub repository:      Option<String>,
    pub institution:     Option<String>,
    pub metadata_prefix: Option<String>,
    pub set_spec:        Option<String>,
    /// 记录整体是否有效
    pub is_valid:        bool,
    pub is_transformed:  bool,
    pub valid_occurrences_by_rule:   OccurrenceMap,
    pub invalid_occurrences_by_rule: OccurrenceMap,
}

impl ValidationObservation {
    pub fn new(id: &str, identifier: &str, snapshot_id: SnapshotId, origin: &str) -> Self {
        Self {
            id: id.into(),
            identifier: identifier.into(),
            snapshot_id,
            origin: origin.into(),
            ..Self::default()
        }
    }

    pub fn with_valid(mut self, rule: &str, values: &[&str]) -> Self {
        self.valid_occurrences_by_rule
            .insert(rule.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_invalid(mut self, rule: &str, values: &[&str]) -> Self {
        self.invalid_occurrences_by_rule
            .insert(rule.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn validate(&self) -> Result<()> {
        require(&self.id, "id")?;
        require(&self.identifier, "identifier")?;
        require(&self.origin, "origin")
    }

    /// 展开为事实行：有效表产出 is_valid=true，无效表产出 is_valid=false
    ///
    /// 规则键无法解析的条目与空值列表不产出行；
    /// 同一观测内 (rule_id, 归一化值, is_valid) 重复的值只保留第一次。
    pub fn explode(&self) -> Vec<FactRow> {
        let mut seen: HashSet<(RuleId, Option<String>, bool)> = HashSet::new();
        let mut rows = Vec::new();
        for (map, is_valid) in [
            (&self.valid_occurrences_by_rule, true),
            (&self.invalid_occurrences_by_rule, false),
        ] {
            for (key, values) in map {
                let Some(rule_id) = parse_rule_id(key, &self.id) else { continue };
                for raw in values {
                    let value = normalize(raw);
                    if !seen.insert((rule_id, value.clone(), is_valid)) {
                        continue;
                    }
                    rows.push(self.fact(rule_id, value, is_valid));
                }
            }
        }
        rows
    }

    fn fact(&self, rule_id: RuleId, value: Option<String>, is_valid: bool) -> FactRow {
        FactRow {
            id:              self.id.clone(),
            identifier:      self.identifier.clone(),
            snapshot_id:     self.snapshot_id,
            origin:          self.origin.clone(),
            network:         self.network.clone(),
            repository:      self.repository.clone(),
            institution:     self.institution.clone(),
            rule_id,
            value,
            is_valid,
            record_is_valid: self.is_valid,
            is_transformed:  self.is_transformed,
            metadata_prefix: self.metadata_prefix.clone(),
            set_spec:        self.set_spec.clone(),
        }
    }
}
