//! 存储与查询配置（TOML）
//!
//! ```toml
//! [catalog]
//! flush_threshold = 10000
//! compression     = "lz4"
//!
//! [query]
//! high_water = 0.9
//!
//! [estimation]
//! transformed = { numerator = 1, denominator = 4 }
//! ```
//!
//! 所有段与字段均可省略，缺省值见各 `Default` 实现。

use std::path::Path;

use serde::Deserialize;

use crate::common::{Result, StoreError};
use crate::field_type::CompressionType;
use crate::segment::DEFAULT_BLOCK_ROWS;

/// Catalog 批次文件滚动阈值（行）
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub catalog:    CatalogConfig,
    pub fact:       FactConfig,
    pub query:      QueryConfig,
    pub estimation: EstimationRatios,
}

impl StoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.flush_threshold == 0 {
            return Err(StoreError::Config("catalog.flush_threshold must be > 0".into()));
        }
        if self.catalog.block_rows == 0 || self.fact.block_rows == 0 {
            return Err(StoreError::Config("block_rows must be > 0".into()));
        }
        self.query.validate()?;
        self.estimation.valid.validate("estimation.valid")?;
        self.estimation.invalid.validate("estimation.invalid")?;
        self.estimation.transformed.validate("estimation.transformed")
    }
}

// ── 各段 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub flush_threshold: usize,
    pub block_rows:      usize,
    pub compression:     CompressionType,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            block_rows:      DEFAULT_BLOCK_ROWS,
            compression:     CompressionType::Lz4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FactConfig {
    pub block_rows:  usize,
    pub compression: CompressionType,
}

impl Default for FactConfig {
    fn default() -> Self {
        Self { block_rows: DEFAULT_BLOCK_ROWS, compression: CompressionType::Lz4 }
    }
}

/// 精确查询引擎的批大小自适应参数
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub min_batch:      usize,
    pub max_batch:      usize,
    /// 分页扫描的初始批大小
    pub page_batch:     usize,
    /// 每处理多少行重新评估一次批大小
    pub check_interval: u64,
    pub high_water:     f64,
    pub low_water:      f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_batch:      1_000,
            max_batch:      10_000,
            page_batch:     5_000,
            check_interval: 50_000,
            high_water:     0.85,
            low_water:      0.50,
        }
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_batch == 0 || self.min_batch > self.max_batch {
            return Err(StoreError::Config(format!(
                "query batch bounds invalid: min {} max {}", self.min_batch, self.max_batch
            )));
        }
        if self.page_batch == 0 || self.check_interval == 0 {
            return Err(StoreError::Config("query.page_batch and check_interval must be > 0".into()));
        }
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(self.low_water) || !in_unit(self.high_water) || self.low_water >= self.high_water {
            return Err(StoreError::Config(format!(
                "query water marks invalid: low {} high {}", self.low_water, self.high_water
            )));
        }
        Ok(())
    }
}

/// 整数比例 numerator/denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Ratio {
    pub numerator:   u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self { numerator, denominator }
    }

    /// `n * numerator / denominator`（向下取整）
    pub fn apply(&self, n: u64) -> u64 {
        if self.denominator == 0 {
            return 0;
        }
        ((n as u128 * self.numerator as u128) / self.denominator as u128) as u64
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.denominator == 0 || self.numerator > self.denominator {
            return Err(StoreError::Config(format!(
                "{name}: ratio {}/{} must lie in [0, 1]", self.numerator, self.denominator
            )));
        }
        Ok(())
    }
}

/// 统计查询引擎的估算比例
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EstimationRatios {
    pub valid:       Ratio,
    pub invalid:     Ratio,
    pub transformed: Ratio,
}

impl Default for EstimationRatios {
    fn default() -> Self {
        Self {
            valid:       Ratio::new(1, 2),
            invalid:     Ratio::new(1, 2),
            transformed: Ratio::new(1, 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, StoreConfig::default());
        assert_eq!(cfg.catalog.flush_threshold, 10_000);
        assert_eq!(cfg.query.check_interval, 50_000);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let cfg = StoreConfig::from_toml_str(r#"
            [catalog]
            flush_threshold = 500
            compression = "none"

            [query]
            high_water = 0.9

            [estimation]
            transformed = { numerator = 1, denominator = 4 }
        "#).unwrap();
        assert_eq!(cfg.catalog.flush_threshold, 500);
        assert_eq!(cfg.catalog.compression, CompressionType::None);
        assert_eq!(cfg.catalog.block_rows, DEFAULT_BLOCK_ROWS);
        assert_eq!(cfg.query.high_water, 0.9);
        assert_eq!(cfg.query.min_batch, 1_000);
        assert_eq!(cfg.estimation.transformed, Ratio::new(1, 4));
        assert_eq!(cfg.estimation.valid, Ratio::new(1, 2));
    }

    #[test]
    fn nonsensical_values_are_rejected() {
        for doc in [
            "[catalog]\nflush_threshold = 0",
            "[query]\nmin_batch = 20000",
            "[query]\nlow_water = 0.9\nhigh_water = 0.5",
            "[estimation]\nvalid = { numerator = 3, denominator = 2 }",
            "[estimation]\ninvalid = { numerator = 0, denominator = 0 }",
        ] {
            assert!(matches!(StoreConfig::from_toml_str(doc), Err(StoreError::Config(_))), "{doc}");
        }
        assert!(matches!(StoreConfig::from_toml_str("[catalog]\nflush_threshold = \"x\""), Err(StoreError::Config(_))));
    }

    #[test]
    fn ratio_uses_integer_arithmetic() {
        assert_eq!(Ratio::new(1, 3).apply(10), 3);
        assert_eq!(Ratio::new(1, 2).apply(7), 3);
        assert_eq!(Ratio::new(1, 1).apply(u64::MAX), u64::MAX);
    }
}
