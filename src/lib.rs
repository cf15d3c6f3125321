//! # harvest-store
//!
//! 采集记录 Catalog 与校验事实表的存储/查询层：
//! - **catalog**：只追加的多批次记录目录（按阈值滚动、流式读取）
//! - **fact**   ：宽校验观测 → 去重后的窄事实行
//! - **query**  ：精确（流式扫描）与统计（块元数据估算）两种查询引擎 + 结果缓存
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  CatalogWriter ──▶ oai_records_batch_000001.seg ...      │
//! │  CatalogReader ◀── (一次只驻留一个批次文件)               │
//! │                                                          │
//! │  ValidationObservation ──explode──▶ FactWriter ──▶ .seg  │
//! │                                                          │
//! │  ExactQueryEngine ───┐                                   │
//! │                      ├──▶ ResultCache (DashMap)          │
//! │  StatisticalEngine ──┘                                   │
//! │          │                                               │
//! │   Segment (多块列存文件)                                  │
//! │   ┌───────────────────────────────────────────────┐      │
//! │   │  Block × N                                    │      │
//! │   │   └─ ColumnWriter × M                         │      │
//! │   │       ├─ encoding  (Plain/RLE/Delta/Dict)     │      │
//! │   │       ├─ compression (LZ4/None)               │      │
//! │   │       ├─ OrdinalIndex  (行号→页偏移)           │      │
//! │   │       ├─ ColumnStats   (min/max 剪枝)         │      │
//! │   │       └─ BloomFilter   (等值加速)             │      │
//! │   │  Footer: schema + 块统计 + CRC                │      │
//! │   └───────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod config;

// ── Segment 层 ────────────────────────────────────────────────────────────────
pub mod field_type;
pub mod encoding;
pub mod compression;
pub mod page;
pub mod index;
pub mod column_writer;
pub mod meta;
pub mod predicate;
pub mod segment;

// ── 业务层 ────────────────────────────────────────────────────────────────────
pub mod catalog;
pub mod fact;
pub mod query;

pub use common::{Result, StoreError};
pub use config::StoreConfig;
