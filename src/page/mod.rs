//! Data Page 读写
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │ value_count  (u32 LE)            │
//! │ first_row_id (u32 LE)            │  块内行号
//! │ uncomp_size  (u32 LE)            │
//! │ has_nulls    (u8)                │
//! │ [null_bitmap (bit-packed)]       │  仅 has_nulls = 1 时存在，1 = null
//! │ data         (encoded+compressed)│  只包含非空值
//! │ CRC32        (u32 LE)            │
//! └──────────────────────────────────┘
//! ```

use crate::common::{Result, StoreError};
use crate::compression;
use crate::encoding;
use crate::field_type::{ColumnMeta, Value};

/// 每页最多容纳的行数
pub const PAGE_MAX_ROWS: usize = 1024;

const HEADER_LEN: usize = 13;

// ── PageBuilder ───────────────────────────────────────────────────────────────

pub struct PageBuilder {
    pub first_row_id: u32,
    values:           Vec<Value>,
}

impl PageBuilder {
    pub fn new(first_row_id: u32) -> Self {
        Self { first_row_id, values: Vec::with_capacity(PAGE_MAX_ROWS) }
    }

    pub fn add(&mut self, v: Value) {
        self.values.push(v);
    }

    pub fn len(&self)      -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool  { self.values.is_empty() }
    pub fn is_full(&self)  -> bool  { self.values.len() >= PAGE_MAX_ROWS }

    /// 序列化为页字节（null bitmap → encode → compress → 加 header+CRC）
    pub fn build(self, meta: &ColumnMeta) -> Result<Vec<u8>> {
        let count     = self.values.len();
        let has_nulls = self.values.iter().any(Value::is_null);

        let mut bitmap = Vec::new();
        if has_nulls {
            bitmap = vec![0u8; count.div_ceil(8)];
            for (i, v) in self.values.iter().enumerate() {
                if v.is_null() {
                    bitmap[i / 8] |= 1 << (i % 8);
                }
            }
        }
        let present: Vec<Value> = self.values.into_iter().filter(|v| !v.is_null()).collect();

        let encoded     = encoding::encode(&present, meta.encoding, meta.field_type)?;
        let uncomp_size = encoded.len() as u32;
        let compressed  = compression::compress(&encoded, meta.compression)?;

        let mut page = Vec::with_capacity(HEADER_LEN + bitmap.len() + compressed.len() + 4);
        page.extend_from_slice(&(count as u32).to_le_bytes());
        page.extend_from_slice(&self.first_row_id.to_le_bytes());
        page.extend_from_slice(&uncomp_size.to_le_bytes());
        page.push(has_nulls as u8);
        page.extend_from_slice(&bitmap);
        page.extend_from_slice(&compressed);

        let crc = crc32fast::hash(&page);
        page.extend_from_slice(&crc.to_le_bytes());
        Ok(page)
    }
}

// ── PageDecoder ───────────────────────────────────────────────────────────────

pub struct PageDecoder {
    /// 页首行在块内的行号
    pub first_row_id: u32,
    pub values:       Vec<Value>,
}

impl PageDecoder {
    pub fn decode(data: &[u8], meta: &ColumnMeta) -> Result<Self> {
        if data.len() < HEADER_LEN + 4 {
            return Err(StoreError::SegmentIo("page data too short".into()));
        }
        let payload_end = data.len() - 4;

        // 先校验 CRC，再信任 header
        let stored_crc = u32::from_le_bytes(le4(&data[payload_end..]));
        let actual_crc = crc32fast::hash(&data[..payload_end]);
        if stored_crc != actual_crc {
            return Err(StoreError::ChecksumMismatch);
        }

        let value_count  = u32::from_le_bytes(le4(&data[0..4])) as usize;
        let first_row_id = u32::from_le_bytes(le4(&data[4..8]));
        let uncomp_size  = u32::from_le_bytes(le4(&data[8..12])) as usize;
        let has_nulls    = data[12] != 0;

        let bitmap_len = if has_nulls { value_count.div_ceil(8) } else { 0 };
        if HEADER_LEN + bitmap_len > payload_end {
            return Err(StoreError::SegmentIo("page null bitmap overruns page".into()));
        }
        let bitmap  = &data[HEADER_LEN..HEADER_LEN + bitmap_len];
        let payload = &data[HEADER_LEN + bitmap_len..payload_end];

        let is_null = |i: usize| has_nulls && bitmap[i / 8] & (1 << (i % 8)) != 0;
        let null_count = (0..value_count).filter(|&i| is_null(i)).count();
        if null_count > 0 && !meta.is_nullable {
            return Err(StoreError::SchemaMismatch(format!(
                "null values in non-nullable column {}", meta.name
            )));
        }

        let raw     = compression::decompress(payload, meta.compression, uncomp_size)?;
        let present = encoding::decode(&raw, meta.encoding, meta.field_type, value_count - null_count)?;

        let values = if null_count == 0 {
            present
        } else {
            let mut present = present.into_iter();
            (0..value_count)
                .map(|i| if is_null(i) { Value::Null } else { present.next().unwrap_or(Value::Null) })
                .collect()
        };

        Ok(Self { first_row_id, values })
    }
}

fn le4(b: &[u8]) -> [u8; 4] {
    [b[0], b[1], b[2], b[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::FieldType;

    #[test]
    fn nulls_survive_bitmap_round_trip() {
        let meta = ColumnMeta::new(0, "value", FieldType::Bytes).nullable();
        let mut pb = PageBuilder::new(0);
        for v in [Value::string("a"), Value::Null, Value::string("b"), Value::Null] {
            pb.add(v);
        }
        let page = pb.build(&meta).unwrap();
        let decoded = PageDecoder::decode(&page, &meta).unwrap();
        assert_eq!(decoded.first_row_id, 0);
        assert_eq!(
            decoded.values,
            vec![Value::string("a"), Value::Null, Value::string("b"), Value::Null]
        );
    }

    #[test]
    fn flipped_byte_is_detected() {
        let meta = ColumnMeta::new(0, "snapshot_id", FieldType::Int64);
        let mut pb = PageBuilder::new(0);
        for i in 0..10 {
            pb.add(Value::Int64(i));
        }
        let mut page = pb.build(&meta).unwrap();
        page[14] ^= 0xFF;
        assert!(matches!(PageDecoder::decode(&page, &meta), Err(StoreError::ChecksumMismatch)));
    }

    #[test]
    fn all_null_page_has_empty_payload() {
        let meta = ColumnMeta::new(0, "set_spec", FieldType::Bytes).nullable();
        let mut pb = PageBuilder::new(5);
        pb.add(Value::Null);
        pb.add(Value::Null);
        let page = pb.build(&meta).unwrap();
        let decoded = PageDecoder::decode(&page, &meta).unwrap();
        assert_eq!(decoded.first_row_id, 5);
        assert_eq!(decoded.values, vec![Value::Null, Value::Null]);
    }
}
