use std::path::Path;
use std::sync::Arc;

use harvest_store::config::{EstimationRatios, FactConfig, QueryConfig};
use harvest_store::fact::{FactReader, FactWriter, ValidationObservation};
use harvest_store::query::{
    AggregationFilter, ExactQueryEngine, FixedPressure, QueryMode, ResultCache,
    StatisticalQueryEngine, ValidationQuery,
};
use tempfile::TempDir;

fn observation(i: usize) -> ValidationObservation {
    let mut obs = ValidationObservation::new(
        &format!("rec-{i}"),
        &format!("oai:repo:{i}"),
        (i % 2) as i64 + 1,
        "https://repo.example.org/oai",
    )
    .with_valid("10", &["dc.title"])
    .with_valid("11", &["en", " en ", "en"])
    .with_invalid(&format!("{}", 20 + i % 4), &["missing", "missing "]);
    obs.network        = Some(["BR", "AR", "MX"][i % 3].into());
    obs.is_valid       = i % 4 != 0;
    obs.is_transformed = i % 5 == 0;
    obs
}

fn write_facts(path: &Path, n: usize) -> u64 {
    let cfg = FactConfig { block_rows: 97, ..FactConfig::default() };
    let mut w = FactWriter::create(path, &cfg).unwrap();
    let observations: Vec<_> = (0..n).map(observation).collect();
    let rows = w.write_observations(&observations).unwrap();
    w.close().unwrap();
    rows
}

fn exact_engine(cache: Arc<ResultCache>) -> ExactQueryEngine {
    let config = QueryConfig { min_batch: 8, max_batch: 64, page_batch: 16, check_interval: 32, ..QueryConfig::default() };
    ExactQueryEngine::new(cache, Arc::new(|| 0.2), config).unwrap()
}

fn filters() -> Vec<AggregationFilter> {
    vec![
        AggregationFilter::all(),
        AggregationFilter::all().snapshot(1),
        AggregationFilter::all().valid(false),
        AggregationFilter::all().record_valid(false).transformed(true),
        AggregationFilter::all().with_valid_rule(11),
        AggregationFilter::all().with_invalid_rule(22).snapshot(1),
        AggregationFilter::all().identifier("oai:repo:7"),
        AggregationFilter::all().with_valid_rule(22),
    ]
}

#[test]
fn duplicate_values_produce_one_fact_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    // 每条观测：10/title、11/en、2x/missing 各一行
    assert_eq!(write_facts(&path, 10), 30);

    let rows = FactReader::open(&path, None).unwrap().read_all().unwrap();
    let en: Vec<_> = rows.iter()
        .filter(|r| r.id == "rec-0" && r.rule_id == 11)
        .collect();
    assert_eq!(en.len(), 1);
    assert_eq!(en[0].value.as_deref(), Some("en"));
    assert!(en[0].is_valid);
}

#[test]
fn exact_count_matches_reference_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    write_facts(&path, 500);
    let reference = FactReader::open(&path, None).unwrap().read_all().unwrap();
    let engine = exact_engine(Arc::new(ResultCache::new()));

    for filter in filters() {
        let expected = reference.iter().filter(|r| filter.matches(r)).count() as u64;
        assert_eq!(engine.count(&path, &filter).unwrap(), expected, "{filter:?}");
        assert_eq!(engine.aggregate(&path, &filter).unwrap().total_count, expected, "{filter:?}");
    }
}

#[test]
fn exact_count_is_stable_under_memory_pressure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    let total = write_facts(&path, 300);
    let config = QueryConfig { min_batch: 2, max_batch: 50, check_interval: 10, ..QueryConfig::default() };
    let engine = ExactQueryEngine::new(Arc::new(ResultCache::new()), Arc::new(FixedPressure(0.99)), config).unwrap();
    assert_eq!(engine.count(&path, &AggregationFilter::all()).unwrap(), total);
}

#[test]
fn statistical_count_is_sum_of_block_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    write_facts(&path, 123);
    let reader = FactReader::open(&path, None).unwrap();
    let block_sum: u64 = reader.block_statistics().iter().map(|b| b.row_count).sum();
    assert!(reader.block_statistics().len() > 1);

    let engine = StatisticalQueryEngine::new(Arc::new(ResultCache::new()), EstimationRatios::default());
    for filter in filters() {
        assert_eq!(engine.count(&path, &filter).unwrap(), block_sum);
    }
    assert_eq!(engine.aggregate(&path, &AggregationFilter::all().valid(true)).unwrap().total_count, block_sum);
}

#[test]
fn pagination_returns_the_requested_window() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    write_facts(&path, 200);
    let reference = FactReader::open(&path, None).unwrap().read_all().unwrap();
    let engine = exact_engine(Arc::new(ResultCache::new()));

    let filter = AggregationFilter::all().valid(false).snapshot(2);
    let matching: Vec<_> = reference.into_iter().filter(|r| filter.matches(r)).collect();
    for (offset, limit) in [(0, 10), (7, 25), (matching.len() - 3, 10), (matching.len(), 5), (10_000, 5)] {
        let page = engine.page(&path, &filter, offset, limit).unwrap();
        let end = (offset + limit).min(matching.len());
        let expected = if offset >= matching.len() { &[][..] } else { &matching[offset..end] };
        assert_eq!(page, expected, "offset {offset} limit {limit}");
    }

    let statistical = StatisticalQueryEngine::new(Arc::new(ResultCache::new()), EstimationRatios::default());
    assert!(statistical.page(&path, &filter, 0, 10).unwrap().is_empty());
}

#[test]
fn repeated_aggregate_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    write_facts(&path, 100);

    let cache = Arc::new(ResultCache::new());
    let exact = exact_engine(Arc::clone(&cache));
    let statistical = StatisticalQueryEngine::new(Arc::clone(&cache), EstimationRatios::default());
    let filter = AggregationFilter::all().with_invalid_rule(21);

    let first = exact.aggregate(&path, &filter).unwrap();
    let scans = exact.scan_count();
    let second = exact.aggregate(&path, &filter).unwrap();
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(exact.scan_count(), scans);

    // 统计引擎使用独立的缓存键
    let estimated = statistical.aggregate(&path, &filter).unwrap();
    assert_ne!(estimated.total_count, first.total_count);
    assert_eq!(statistical.scan_count(), 1);
    statistical.aggregate(&path, &filter).unwrap();
    assert_eq!(statistical.scan_count(), 1);
    assert_eq!(cache.len(), 2);

    cache.invalidate_file(&path);
    exact.aggregate(&path, &filter).unwrap();
    assert_eq!(exact.scan_count(), scans + 1);
}

#[test]
fn shared_cache_serves_concurrent_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("facts.seg");
    write_facts(&path, 300);

    let cache = Arc::new(ResultCache::new());
    let engines = [exact_engine(Arc::clone(&cache)), exact_engine(Arc::clone(&cache))];
    let filter = AggregationFilter::all().snapshot(2).with_valid_rule(11);
    let (file, key) = (path.as_path(), &filter);

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = engines.iter()
            .map(|engine| s.spawn(move || engine.aggregate(file, key).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].total_count, 150);
    assert_eq!(cache.len(), 1);
    let cached = cache.get(QueryMode::Exact, &path, &filter).unwrap();
    assert!(results.iter().any(|r| Arc::ptr_eq(r, &cached)));

    // 任一引擎再次查询都命中缓存
    let scans: u64 = engines.iter().map(|e| e.scan_count()).sum();
    for engine in &engines {
        engine.aggregate(&path, &filter).unwrap();
    }
    assert_eq!(engines.iter().map(|e| e.scan_count()).sum::<u64>(), scans);
}
