//! 行 Schema：列定义 + 逻辑 schema_hash（随 Segment Footer 持久化）

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{Result, SchemaHash, StoreError};
use crate::field_type::{ColumnMeta, CompressionType, EncodingType, FieldType, Value};

// ── Row Schema ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    pub name:        String,
    pub columns:     Vec<ColumnMeta>,
    pub schema_hash: SchemaHash,
}

impl RowSchema {
    pub fn new(name: &str, columns: Vec<ColumnMeta>) -> Self {
        let schema_hash = logical_hash(name, &columns);
        Self { name: name.into(), columns, schema_hash }
    }

    /// 为所有列统一设置压缩方式（不影响 schema_hash）
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        for c in &mut self.columns {
            c.compression = comp;
        }
        self
    }

    pub fn num_columns(&self) -> usize { self.columns.len() }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns.iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn(name.into()))
    }

    /// 校验一行的列数、类型与可空性
    pub fn check_row(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(StoreError::SchemaMismatch(format!(
                "{}: row has {} values, schema has {} columns",
                self.name, row.len(), self.columns.len()
            )));
        }
        for (col, v) in self.columns.iter().zip(row) {
            if !col.accepts(v) {
                return Err(StoreError::SchemaMismatch(format!(
                    "{}.{}: value {v:?} not accepted by {:?}{}",
                    self.name, col.name, col.field_type,
                    if col.is_nullable { "" } else { " NOT NULL" }
                )));
            }
        }
        Ok(())
    }

    /// 读取方校验：文件 schema 必须与期望 schema 逻辑一致
    pub fn expect_same(&self, found: &RowSchema) -> Result<()> {
        if self.schema_hash != found.schema_hash {
            return Err(StoreError::SchemaMismatch(format!(
                "expected schema {} ({:#010x}), file has {} ({:#010x})",
                self.name, self.schema_hash, found.name, found.schema_hash
            )));
        }
        Ok(())
    }

    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        write_str(out, &self.name)?;
        out.write_u32::<LittleEndian>(self.columns.len() as u32)?;
        for c in &self.columns {
            out.write_u32::<LittleEndian>(c.column_id)?;
            write_str(out, &c.name)?;
            out.write_u8(c.field_type.tag())?;
            out.write_u8(c.is_nullable as u8)?;
            out.write_u8(c.encoding.tag())?;
            out.write_u8(c.compression.tag())?;
            out.write_u8(c.bloom as u8)?;
        }
        Ok(())
    }

    pub fn deserialize(cur: &mut Cursor<&[u8]>) -> Result<Self> {
        let name = read_str(cur)?;
        let n    = cur.read_u32::<LittleEndian>()? as usize;
        let mut columns = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            let column_id   = cur.read_u32::<LittleEndian>()?;
            let col_name    = read_str(cur)?;
            let field_type  = FieldType::from_tag(cur.read_u8()?)
                .ok_or_else(|| StoreError::SegmentIo("unknown field type tag".into()))?;
            let is_nullable = cur.read_u8()? != 0;
            let encoding    = EncodingType::from_tag(cur.read_u8()?)
                .ok_or_else(|| StoreError::SegmentIo("unknown encoding tag".into()))?;
            let compression = CompressionType::from_tag(cur.read_u8()?)
                .ok_or_else(|| StoreError::SegmentIo("unknown compression tag".into()))?;
            let bloom       = cur.read_u8()? != 0;
            columns.push(ColumnMeta {
                column_id, name: col_name, field_type, is_nullable,
                encoding, compression, bloom,
            });
        }
        Ok(Self::new(&name, columns))
    }
}

/// 逻辑 hash：只覆盖 schema 名、列名、类型与可空性
fn logical_hash(name: &str, columns: &[ColumnMeta]) -> SchemaHash {
    let mut h = crc32fast::Hasher::new();
    h.update(name.as_bytes());
    for c in columns {
        h.update(&c.column_id.to_le_bytes());
        h.update(c.name.as_bytes());
        h.update(&[c.field_type.tag(), c.is_nullable as u8]);
    }
    h.finalize()
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u16::<LittleEndian>(s.len() as u16)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_str(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let len   = cur.read_u16::<LittleEndian>()? as usize;
    let start = cur.position() as usize;
    let data  = *cur.get_ref();
    let bytes = data.get(start..start + len)
        .ok_or_else(|| StoreError::SegmentIo("schema string overruns footer".into()))?;
    cur.set_position((start + len) as u64);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StoreError::SegmentIo(format!("schema string is not utf-8: {e}")))
}
