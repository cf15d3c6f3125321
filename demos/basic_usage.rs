//! # harvest-store 使用案例
//!
//! 1. 加载配置
//! 2. 写入多批次 Catalog 并流式读回
//! 3. 展开校验观测写入事实表
//! 4. 精确 / 统计两种引擎查询同一事实文件
//!
//! 运行：`RUST_LOG=harvest_store=debug cargo run --example basic_usage`

use std::sync::Arc;

use harvest_store::{
    catalog::{CatalogEntry, CatalogReader, CatalogWriter},
    config::StoreConfig,
    fact::{FactWriter, ValidationObservation},
    query::{AggregationFilter, ExactQueryEngine, ResultCache, StatisticalQueryEngine, ValidationQuery},
};
use tracing_subscriber::EnvFilter;

fn main() -> harvest_store::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let base = std::env::temp_dir().join("harvest-store-demo");
    let _ = std::fs::remove_dir_all(&base);
    std::fs::create_dir_all(&base)?;

    // =========================================================================
    // 1. 配置
    // =========================================================================
    let config = StoreConfig::from_toml_str(r#"
        [catalog]
        flush_threshold = 2500

        [fact]
        block_rows = 1024
    "#)?;
    println!("【1】flush_threshold = {}", config.catalog.flush_threshold);

    // =========================================================================
    // 2. Catalog 写入 / 读取
    // =========================================================================
    let snapshot_id = 42;
    let mut writer = CatalogWriter::open(&base, snapshot_id, &config.catalog)?;
    for i in 0..10_000u32 {
        let entry = CatalogEntry::new(
            format!("{:016x}", u64::from(i).wrapping_mul(0x9e37_79b9_7f4a_7c15)),
            format!("oai:demo.example.org:{i}"),
            1_700_000_000_000 + i64::from(i),
            format!("md5-{i}"),
            i % 97 == 0,
        );
        writer.write(&entry)?;
    }
    // 一条缺少 identifier 的条目会被跳过
    writer.write(&CatalogEntry::new("x", " ", 0, "y", false))?;
    println!("【2】written = {}, skipped = {}", writer.total_written(), writer.skipped());
    writer.close()?;

    let mut reader = CatalogReader::open(&base, snapshot_id)?;
    let files = reader.file_count();
    let mut deleted = 0;
    reader.for_each(|e| if e.deleted { deleted += 1 })?;
    println!("    files = {files}, records = {}, tombstones = {deleted}", reader.records_read());

    // =========================================================================
    // 3. 事实表
    // =========================================================================
    let fact_path = base.join("validation_facts.seg");
    let mut facts = FactWriter::create(&fact_path, &config.fact)?;
    for i in 0..5_000 {
        let mut obs = ValidationObservation::new(&format!("rec-{i}"), &format!("oai:demo:{i}"), snapshot_id, "https://demo.example.org/oai")
            .with_valid("1", &["dc.title"])
            .with_valid("2", &["en", "en"])
            .with_invalid(&format!("{}", 3 + i % 3), &["missing"]);
        obs.network        = Some("DEMO".into());
        obs.is_valid       = i % 3 != 0;
        obs.is_transformed = i % 10 == 0;
        facts.write_observation(&obs)?;
    }
    let summary = facts.close()?;
    println!("【3】fact rows = {}, blocks = {}, bytes = {}", summary.rows, summary.blocks, summary.bytes);

    // =========================================================================
    // 4. 查询
    // =========================================================================
    let cache = Arc::new(ResultCache::new());
    let exact = ExactQueryEngine::new(Arc::clone(&cache), Arc::new(|| 0.3), config.query)?;
    let estimated = StatisticalQueryEngine::new(Arc::clone(&cache), config.estimation);

    let filter = AggregationFilter::all().snapshot(snapshot_id).record_valid(false);
    let r = exact.aggregate(&fact_path, &filter)?;
    println!("【4】exact: total = {}, valid = {}, invalid = {}, rules = {:?}",
             r.total_count, r.valid_count, r.invalid_count, r.invalid_rule_counts);
    let r = estimated.aggregate(&fact_path, &filter)?;
    println!("    estimated: total = {}, valid ≈ {}, invalid ≈ {}", r.total_count, r.valid_count, r.invalid_count);

    let page = exact.page(&fact_path, &AggregationFilter::all().with_invalid_rule(4), 10, 3)?;
    for row in &page {
        println!("    page: {} rule={} value={:?}", row.identifier, row.rule_id, row.value);
    }
    println!("    cache entries = {}, exact scans = {}", cache.len(), exact.scan_count());
    Ok(())
}
