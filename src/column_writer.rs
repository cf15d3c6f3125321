//! 列写入器
//!
//! 每个块（block）的每列独立维护：
//!   - Data Page 缓冲区
//!   - OrdinalIndex（行号→页偏移）
//!   - ColumnStats（min/max/null_count，块剪枝）
//!   - BloomFilter（等值过滤，仅字符串列）

use crate::common::Result;
use crate::field_type::{ColumnMeta, Value};
use crate::index::{BloomFilter, ColumnStats, OrdinalIndex};
use crate::page::PageBuilder;

/// 一个已完成的列块：页字节 + 索引
#[derive(Debug)]
pub struct ColumnChunk {
    pub data:    Vec<u8>,
    pub ordinal: OrdinalIndex,
    pub stats:   ColumnStats,
    pub bloom:   Option<BloomFilter>,
}

pub struct ColumnWriter {
    pub meta:      ColumnMeta,
    // 已完成页的序列化字节（连续存放）
    data:          Vec<u8>,
    current:       PageBuilder,
    // 块内行计数（跨页累计）
    next_row_id:   u32,
    ordinal_index: OrdinalIndex,
    stats:         ColumnStats,
    bloom:         Option<BloomFilter>,
}

impl ColumnWriter {
    /// `expected_rows` 用于估算 BloomFilter 大小
    pub fn new(meta: ColumnMeta, expected_rows: usize) -> Self {
        let bloom = meta.bloom.then(|| BloomFilter::new(expected_rows));
        Self {
            meta, data: Vec::new(),
            current: PageBuilder::new(0), next_row_id: 0,
            ordinal_index: OrdinalIndex::default(),
            stats: ColumnStats::default(),
            bloom,
        }
    }

    /// 追加一个值到本列
    pub fn add_value(&mut self, value: Value) -> Result<()> {
        self.stats.update(&value);
        if let (Some(bf), false) = (self.bloom.as_mut(), value.is_null()) {
            bf.add(&value.to_sort_key());
        }

        self.current.add(value);
        self.next_row_id += 1;

        if self.current.is_full() {
            self.flush_page()?;
        }
        Ok(())
    }

    fn flush_page(&mut self) -> Result<()> {
        let first_rid = self.current.first_row_id;
        let bytes     = std::mem::replace(&mut self.current, PageBuilder::new(self.next_row_id))
            .build(&self.meta)?;

        self.ordinal_index.add(first_rid, self.data.len() as u64);
        self.data.extend_from_slice(&bytes);
        Ok(())
    }

    /// 完成写入，返回列块
    pub fn finalize(mut self) -> Result<ColumnChunk> {
        if !self.current.is_empty() {
            self.flush_page()?;
        }
        Ok(ColumnChunk {
            data:    self.data,
            ordinal: self.ordinal_index,
            stats:   self.stats,
            bloom:   self.bloom,
        })
    }

    pub fn num_rows(&self) -> u32 { self.next_row_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::FieldType;
    use crate::page::{PageDecoder, PAGE_MAX_ROWS};

    #[test]
    fn pages_split_at_page_max_rows() {
        let meta = ColumnMeta::new(0, "rule_id", FieldType::Int32);
        let mut cw = ColumnWriter::new(meta.clone(), 3000);
        for i in 0..(PAGE_MAX_ROWS as i32 * 2 + 10) {
            cw.add_value(Value::Int32(i)).unwrap();
        }
        assert_eq!(cw.num_rows() as usize, PAGE_MAX_ROWS * 2 + 10);
        let chunk = cw.finalize().unwrap();
        assert_eq!(chunk.ordinal.page_count(), 3);
        assert!(chunk.bloom.is_none());

        let mut all = Vec::new();
        for (start, end) in chunk.ordinal.page_ranges(chunk.data.len() as u64) {
            let page = PageDecoder::decode(&chunk.data[start as usize..end as usize], &meta).unwrap();
            all.extend(page.values);
        }
        assert_eq!(all.len(), PAGE_MAX_ROWS * 2 + 10);
        assert_eq!(all[PAGE_MAX_ROWS], Value::Int32(PAGE_MAX_ROWS as i32));
    }

    #[test]
    fn byte_columns_fill_bloom_and_stats() {
        let meta = ColumnMeta::new(0, "network", FieldType::Bytes).nullable();
        let mut cw = ColumnWriter::new(meta, 16);
        cw.add_value(Value::string("BR")).unwrap();
        cw.add_value(Value::Null).unwrap();
        let chunk = cw.finalize().unwrap();
        let bloom = chunk.bloom.expect("bytes column has bloom");
        assert!(bloom.may_contain(b"BR"));
        assert_eq!(chunk.stats.null_count, 1);
        assert_eq!(chunk.stats.min.as_deref(), Some(&b"BR"[..]));
    }
}
