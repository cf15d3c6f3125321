//! 索引结构（随 Footer 持久化）
//!
//! 三种索引：
//! - **OrdinalIndex** — 稀疏行号→页偏移，定位列块内的页边界
//! - **ColumnStats**  — 列块级 min/max/null_count（zone map），块剪枝
//! - **BloomFilter**  — 双哈希位数组，等值查询快速过滤，FPP ≈ 1%

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{Result, StoreError};
use crate::field_type::Value;

fn read_blob(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len   = cur.read_u32::<LittleEndian>()? as usize;
    let start = cur.position() as usize;
    let data  = *cur.get_ref();
    if start + len > data.len() {
        return Err(StoreError::SegmentIo("index blob overruns footer".into()));
    }
    cur.set_position((start + len) as u64);
    Ok(data[start..start + len].to_vec())
}

fn write_blob(out: &mut Vec<u8>, blob: &[u8]) -> Result<()> {
    out.write_u32::<LittleEndian>(blob.len() as u32)?;
    out.extend_from_slice(blob);
    Ok(())
}

// ── Ordinal Index ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrdinalIndex {
    /// (first_row_id, 页在列块内的偏移) 有序列表
    entries: Vec<(u32, u64)>,
}

impl OrdinalIndex {
    pub fn add(&mut self, first_row_id: u32, page_offset: u64) {
        self.entries.push((first_row_id, page_offset));
    }

    /// 每页的 [start, end) 字节区间；`chunk_size` 为整个列块长度
    pub fn page_ranges(&self, chunk_size: u64) -> Vec<(u64, u64)> {
        self.entries.iter().enumerate()
            .map(|(i, (_, start))| {
                let end = self.entries.get(i + 1).map(|(_, o)| *o).unwrap_or(chunk_size);
                (*start, end)
            })
            .collect()
    }

    pub fn page_count(&self) -> usize { self.entries.len() }

    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        for (rid, off) in &self.entries {
            out.write_u32::<LittleEndian>(*rid)?;
            out.write_u64::<LittleEndian>(*off)?;
        }
        Ok(())
    }

    pub fn deserialize(cur: &mut Cursor<&[u8]>) -> Result<Self> {
        let n = cur.read_u32::<LittleEndian>()? as usize;
        let mut entries = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            let rid = cur.read_u32::<LittleEndian>()?;
            let off = cur.read_u64::<LittleEndian>()?;
            entries.push((rid, off));
        }
        Ok(Self { entries })
    }
}

// ── Zone Map（列块统计）────────────────────────────────────────────────────────

/// 一个列块的统计信息；min/max 为 `Value::to_sort_key` 字节串，全 null 时为 None
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColumnStats {
    pub min:        Option<Vec<u8>>,
    pub max:        Option<Vec<u8>>,
    pub null_count: u64,
}

impl ColumnStats {
    pub fn update(&mut self, value: &Value) {
        if value.is_null() {
            self.null_count += 1;
            return;
        }
        let key = value.to_sort_key();
        if self.min.as_deref().map(|m| key.as_slice() < m).unwrap_or(true) {
            self.min = Some(key.clone());
        }
        if self.max.as_deref().map(|m| key.as_slice() > m).unwrap_or(true) {
            self.max = Some(key);
        }
    }

    /// 块内是否可能存在等于 `value` 的行
    pub fn may_contain(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.null_count > 0;
        }
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => {
                let key = value.to_sort_key();
                min.as_slice() <= key.as_slice() && key.as_slice() <= max.as_slice()
            }
            // 全 null 块不可能命中非空值
            _ => false,
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u64::<LittleEndian>(self.null_count)?;
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => {
                out.write_u8(1)?;
                write_blob(out, min)?;
                write_blob(out, max)?;
            }
            _ => out.write_u8(0)?,
        }
        Ok(())
    }

    pub fn deserialize(cur: &mut Cursor<&[u8]>) -> Result<Self> {
        let null_count = cur.read_u64::<LittleEndian>()?;
        let (min, max) = if cur.read_u8()? != 0 {
            (Some(read_blob(cur)?), Some(read_blob(cur)?))
        } else {
            (None, None)
        };
        Ok(Self { min, max, null_count })
    }
}

// ── Bloom Filter ──────────────────────────────────────────────────────────────

const BLOOM_HASHES: u64 = 7;

/// 双哈希 Bloom Filter（FNV-1a），每个不同值约 10 bit，7 个哈希函数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits:     Vec<u8>,
    num_bits: usize,
}

impl BloomFilter {
    /// 根据期望基数创建（num_bits ≈ ndv × 10）
    pub fn new(expected_ndv: usize) -> Self {
        let num_bits  = (expected_ndv * 10).max(64);
        let num_bytes = num_bits.div_ceil(8);
        Self { bits: vec![0u8; num_bytes], num_bits }
    }

    fn hashes(value: &[u8]) -> (u64, u64) {
        let mut h1: u64 = 0xcbf29ce484222325;
        let mut h2: u64 = 0x517cc1b727220a95;
        for &b in value {
            h1 ^= b as u64;
            h1 = h1.wrapping_mul(0x100000001b3);
            h2 = (h2 ^ b as u64).rotate_left(5).wrapping_mul(0x9e3779b97f4a7c15);
        }
        (h1, h2 | 1)
    }

    fn probe_bits(&self, value: &[u8]) -> impl Iterator<Item = usize> {
        let (h1, h2) = Self::hashes(value);
        let nb = self.num_bits as u64;
        (0..BLOOM_HASHES).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % nb) as usize)
    }

    pub fn add(&mut self, value: &[u8]) {
        let probes: Vec<usize> = self.probe_bits(value).collect();
        for bit in probes {
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
    }

    pub fn may_contain(&self, value: &[u8]) -> bool {
        if self.num_bits == 0 { return true; }
        self.probe_bits(value).all(|bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }

    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_u32::<LittleEndian>(self.num_bits as u32)?;
        write_blob(out, &self.bits)
    }

    pub fn deserialize(cur: &mut Cursor<&[u8]>) -> Result<Self> {
        let num_bits = cur.read_u32::<LittleEndian>()? as usize;
        let bits     = read_blob(cur)?;
        if bits.len() * 8 < num_bits {
            return Err(StoreError::SegmentIo("bloom filter bitmap too short".into()));
        }
        Ok(Self { bits, num_bits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_ranges_cover_chunk() {
        let mut idx = OrdinalIndex::default();
        idx.add(0, 0);
        idx.add(1024, 300);
        idx.add(2048, 700);
        assert_eq!(idx.page_ranges(900), vec![(0, 300), (300, 700), (700, 900)]);
    }

    #[test]
    fn zone_map_prunes_out_of_range_values() {
        let mut stats = ColumnStats::default();
        for v in [10i64, 20, 30] {
            stats.update(&Value::Int64(v));
        }
        assert!(stats.may_contain(&Value::Int64(20)));
        assert!(!stats.may_contain(&Value::Int64(31)));
        assert!(!stats.may_contain(&Value::Int64(-1)));
        assert!(!stats.may_contain(&Value::Null));
        stats.update(&Value::Null);
        assert!(stats.may_contain(&Value::Null));
    }

    #[test]
    fn bloom_has_no_false_negatives() {
        let mut bf = BloomFilter::new(1000);
        for i in 0..1000 {
            bf.add(format!("oai:repo:{i}").as_bytes());
        }
        assert!((0..1000).all(|i| bf.may_contain(format!("oai:repo:{i}").as_bytes())));
        let false_hits = (0..1000)
            .filter(|i| bf.may_contain(format!("other:{i}").as_bytes()))
            .count();
        assert!(false_hits < 100, "too many false positives: {false_hits}");
    }

    #[test]
    fn stats_and_bloom_survive_serialization() {
        let mut stats = ColumnStats::default();
        stats.update(&Value::string("b"));
        stats.update(&Value::string("a"));
        stats.update(&Value::Null);
        let mut bf = BloomFilter::new(4);
        bf.add(b"a");

        let mut out = Vec::new();
        stats.serialize(&mut out).unwrap();
        bf.serialize(&mut out).unwrap();

        let mut cur = Cursor::new(out.as_slice());
        assert_eq!(ColumnStats::deserialize(&mut cur).unwrap(), stats);
        assert_eq!(BloomFilter::deserialize(&mut cur).unwrap(), bf);
    }
}
