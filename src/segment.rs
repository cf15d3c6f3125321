//! Segment 文件读写（多块列存）
//!
//! 文件格式：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC      (8 bytes) "HVSTSEG\0"  │
//! │  Version    (4 bytes) = 1          │
//! │  SchemaHash (4 bytes)              │
//! ├────────────────────────────────────┤
//! │  BLOCK 0                           │
//! │    [Column chunk col 0]            │ ← Data Pages，编码 + LZ4
//! │    [Column chunk col 1]            │
//! │    ...                             │
//! │  BLOCK 1 ...                       │
//! ├────────────────────────────────────┤
//! │  FOOTER                            │
//! │    RowSchema                       │
//! │    per block: row_count            │
//! │      per column: offset/size       │
//! │        OrdinalIndex / ColumnStats  │
//! │        [BloomFilter]               │
//! │    Footer CRC32  (4 bytes)         │
//! │    Footer length (4 bytes)         │
//! │    MAGIC         (8 bytes)         │
//! └────────────────────────────────────┘
//! ```
//!
//! 写入端每满 `block_rows` 行即落盘一个块，内存只保留当前块与块元数据。
//! 读取端只读 Footer 即可得到全部块统计；行按块惰性解码。

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, trace};

use crate::column_writer::ColumnWriter;
use crate::common::{Result, StoreError};
use crate::field_type::{CompressionType, Value};
use crate::index::{BloomFilter, ColumnStats, OrdinalIndex};
use crate::meta::RowSchema;
use crate::page::PageDecoder;
use crate::predicate::{BoundPredicate, Predicate};

const MAGIC: &[u8; 8] = b"HVSTSEG\0";
const VERSION: u32     = 1;
const HEADER_LEN: u64  = 16;
const TRAILER_LEN: u64 = 16;

/// Segment 文件扩展名（不含点）
pub const SEGMENT_FILE_EXTENSION: &str = "seg";
/// 默认每块行数
pub const DEFAULT_BLOCK_ROWS: usize = 8192;

pub type Row = Vec<Value>;

// ── 选项与统计 ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    pub compression: CompressionType,
    /// 块大小提示（行数）
    pub block_rows:  usize,
    /// 目标文件已存在时是否覆盖
    pub overwrite:   bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self { compression: CompressionType::Lz4, block_rows: DEFAULT_BLOCK_ROWS, overwrite: false }
    }
}

impl SegmentOptions {
    pub fn with_block_rows(mut self, rows: usize) -> Self {
        self.block_rows = rows.max(1); self
    }
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        self.compression = comp; self
    }
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true; self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBlockStats {
    pub stats: ColumnStats,
    pub bloom: Option<BloomFilter>,
}

/// 块级元数据：精确行数 + 每列统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStats {
    pub row_count: u64,
    pub columns:   Vec<ColumnBlockStats>,
}

#[derive(Debug, Clone)]
struct ChunkMeta {
    offset:  u64,
    size:    u64,
    ordinal: OrdinalIndex,
}

/// close() 的返回值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub path:   PathBuf,
    pub rows:   u64,
    pub blocks: usize,
    pub bytes:  u64,
}

// ── Footer ────────────────────────────────────────────────────────────────────

struct SegmentFooter {
    schema: RowSchema,
    blocks: Vec<BlockStats>,
    chunks: Vec<Vec<ChunkMeta>>,
}

impl SegmentFooter {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.schema.serialize(&mut out)?;
        out.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        for (block, chunks) in self.blocks.iter().zip(&self.chunks) {
            out.write_u64::<LittleEndian>(block.row_count)?;
            for (col, chunk) in block.columns.iter().zip(chunks) {
                out.write_u64::<LittleEndian>(chunk.offset)?;
                out.write_u64::<LittleEndian>(chunk.size)?;
                chunk.ordinal.serialize(&mut out)?;
                col.stats.serialize(&mut out)?;
                match &col.bloom {
                    Some(bf) => {
                        out.write_u8(1)?;
                        bf.serialize(&mut out)?;
                    }
                    None => out.write_u8(0)?,
                }
            }
        }
        Ok(out)
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cur    = Cursor::new(data);
        let schema     = RowSchema::deserialize(&mut cur)?;
        let num_cols   = schema.num_columns();
        let num_blocks = cur.read_u32::<LittleEndian>()? as usize;

        let mut blocks = Vec::with_capacity(num_blocks.min(1 << 16));
        let mut chunks = Vec::with_capacity(num_blocks.min(1 << 16));
        for _ in 0..num_blocks {
            let row_count = cur.read_u64::<LittleEndian>()?;
            let mut columns      = Vec::with_capacity(num_cols);
            let mut block_chunks = Vec::with_capacity(num_cols);
            for _ in 0..num_cols {
                let offset  = cur.read_u64::<LittleEndian>()?;
                let size    = cur.read_u64::<LittleEndian>()?;
                let ordinal = OrdinalIndex::deserialize(&mut cur)?;
                let stats   = ColumnStats::deserialize(&mut cur)?;
                let bloom   = if cur.read_u8()? != 0 {
                    Some(BloomFilter::deserialize(&mut cur)?)
                } else {
                    None
                };
                columns.push(ColumnBlockStats { stats, bloom });
                block_chunks.push(ChunkMeta { offset, size, ordinal });
            }
            blocks.push(BlockStats { row_count, columns });
            chunks.push(block_chunks);
        }
        Ok(Self { schema, blocks, chunks })
    }
}

// ── SegmentWriter ─────────────────────────────────────────────────────────────

pub struct SegmentWriter {
    path:          PathBuf,
    out:           BufWriter<File>,
    schema:        RowSchema,
    block_rows:    usize,
    columns:       Vec<ColumnWriter>,
    rows_in_block: usize,
    pos:           u64,
    blocks:        Vec<BlockStats>,
    chunks:        Vec<Vec<ChunkMeta>>,
    total_rows:    u64,
}

impl SegmentWriter {
    /// 创建 Segment 文件并写入文件头
    pub fn create(path: &Path, schema: RowSchema, options: SegmentOptions) -> Result<Self> {
        let schema = schema.with_compression(options.compression);
        let file = if options.overwrite {
            OpenOptions::new().write(true).create(true).truncate(true).open(path)?
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)?
        };
        let mut out = BufWriter::new(file);
        out.write_all(MAGIC)?;
        out.write_u32::<LittleEndian>(VERSION)?;
        out.write_u32::<LittleEndian>(schema.schema_hash)?;

        let block_rows = options.block_rows.max(1);
        debug!(path = %path.display(), schema = %schema.name, block_rows, "segment writer opened");
        Ok(Self {
            path: path.to_path_buf(),
            out,
            columns: new_column_writers(&schema, block_rows),
            schema,
            block_rows,
            rows_in_block: 0,
            pos: HEADER_LEN,
            blocks: Vec::new(),
            chunks: Vec::new(),
            total_rows: 0,
        })
    }

    /// 追加一行，`row` 的列数/类型/可空性必须与 schema 一致
    pub fn append_row(&mut self, row: Row) -> Result<()> {
        self.schema.check_row(&row)?;
        for (col, v) in self.columns.iter_mut().zip(row) {
            col.add_value(v)?;
        }
        self.rows_in_block += 1;
        self.total_rows    += 1;
        if self.rows_in_block >= self.block_rows {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        let writers = std::mem::replace(
            &mut self.columns,
            new_column_writers(&self.schema, self.block_rows),
        );
        let mut columns = Vec::with_capacity(writers.len());
        let mut chunks  = Vec::with_capacity(writers.len());
        for cw in writers {
            let chunk = cw.finalize()?;
            self.out.write_all(&chunk.data)?;
            chunks.push(ChunkMeta {
                offset:  self.pos,
                size:    chunk.data.len() as u64,
                ordinal: chunk.ordinal,
            });
            self.pos += chunk.data.len() as u64;
            columns.push(ColumnBlockStats { stats: chunk.stats, bloom: chunk.bloom });
        }
        trace!(path = %self.path.display(), block = self.blocks.len(), rows = self.rows_in_block, "block flushed");
        self.blocks.push(BlockStats { row_count: self.rows_in_block as u64, columns });
        self.chunks.push(chunks);
        self.rows_in_block = 0;
        Ok(())
    }

    /// 完成写入：落盘剩余块、写 Footer 并 fsync
    pub fn close(mut self) -> Result<SegmentSummary> {
        if self.rows_in_block > 0 {
            self.flush_block()?;
        }
        let footer = SegmentFooter {
            schema: self.schema,
            blocks: self.blocks,
            chunks: self.chunks,
        };
        let footer_bytes = footer.serialize()?;
        let footer_crc   = crc32fast::hash(&footer_bytes);

        self.out.write_all(&footer_bytes)?;
        self.out.write_u32::<LittleEndian>(footer_crc)?;
        self.out.write_u32::<LittleEndian>(footer_bytes.len() as u32)?;
        self.out.write_all(MAGIC)?;
        let bytes = self.pos + footer_bytes.len() as u64 + TRAILER_LEN;

        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        debug!(path = %self.path.display(), rows = self.total_rows, blocks = footer.blocks.len(), bytes, "segment closed");
        Ok(SegmentSummary {
            path:   self.path,
            rows:   self.total_rows,
            blocks: footer.blocks.len(),
            bytes,
        })
    }

    pub fn num_rows(&self) -> u64 { self.total_rows }
    pub fn schema(&self) -> &RowSchema { &self.schema }
    pub fn path(&self) -> &Path { &self.path }
}

fn new_column_writers(schema: &RowSchema, block_rows: usize) -> Vec<ColumnWriter> {
    schema.columns.iter()
        .map(|m| ColumnWriter::new(m.clone(), block_rows))
        .collect()
}

// ── SegmentReader ─────────────────────────────────────────────────────────────

pub struct SegmentReader {
    path:           PathBuf,
    file:           File,
    footer:         SegmentFooter,
    predicate:      Option<BoundPredicate>,
    next_block:     usize,
    current:        std::vec::IntoIter<Row>,
    blocks_skipped: usize,
    blocks_decoded: usize,
}

impl SegmentReader {
    /// 打开 Segment：只读文件头与 Footer，不解码任何行
    pub fn open(path: &Path, predicate: Option<&Predicate>) -> Result<Self> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN + TRAILER_LEN {
            return Err(StoreError::SegmentIo(format!("{}: file too short", path.display())));
        }

        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;
        let version     = file.read_u32::<LittleEndian>()?;
        let header_hash = file.read_u32::<LittleEndian>()?;
        if &magic != MAGIC || version != VERSION {
            return Err(StoreError::SegmentIo(format!(
                "{}: invalid segment header", path.display()
            )));
        }

        file.seek(SeekFrom::Start(len - TRAILER_LEN))?;
        let footer_crc = file.read_u32::<LittleEndian>()?;
        let footer_len = file.read_u32::<LittleEndian>()? as u64;
        file.read_exact(&mut magic)?;
        if &magic != MAGIC || footer_len > len - HEADER_LEN - TRAILER_LEN {
            return Err(StoreError::SegmentIo(format!(
                "{}: invalid segment trailer", path.display()
            )));
        }

        let mut footer_bytes = vec![0u8; footer_len as usize];
        file.seek(SeekFrom::Start(len - TRAILER_LEN - footer_len))?;
        file.read_exact(&mut footer_bytes)?;
        if crc32fast::hash(&footer_bytes) != footer_crc {
            return Err(StoreError::ChecksumMismatch);
        }

        let footer = SegmentFooter::deserialize(&footer_bytes)?;
        if footer.schema.schema_hash != header_hash {
            return Err(StoreError::SchemaMismatch(format!(
                "{}: header and footer schema disagree", path.display()
            )));
        }
        let predicate = predicate.map(|p| p.bind(&footer.schema)).transpose()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            footer,
            predicate,
            next_block: 0,
            current: Vec::new().into_iter(),
            blocks_skipped: 0,
            blocks_decoded: 0,
        })
    }

    pub fn schema(&self) -> &RowSchema { &self.footer.schema }
    pub fn path(&self) -> &Path { &self.path }

    /// 所有块的统计（来自 Footer，无需解码）
    pub fn block_statistics(&self) -> &[BlockStats] { &self.footer.blocks }

    /// Footer 中记录的精确总行数
    pub fn num_rows(&self) -> u64 {
        self.footer.blocks.iter().map(|b| b.row_count).sum()
    }

    /// 因谓词被整体跳过的块数
    pub fn blocks_skipped(&self) -> usize { self.blocks_skipped }
    /// 至今实际解码过的块数
    pub fn blocks_decoded(&self) -> usize { self.blocks_decoded }

    /// 最大块行数：读取时一次解码一整块，这是驻留行数的下限
    pub fn max_block_rows(&self) -> u64 {
        self.footer.blocks.iter().map(|b| b.row_count).max().unwrap_or(0)
    }

    /// 读取下一行（满足谓词）；读完返回 `Ok(None)`
    pub fn read_next(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.current.next() {
                match &self.predicate {
                    Some(p) if !p.matches(&row) => continue,
                    _ => return Ok(Some(row)),
                }
            }
            if self.next_block >= self.footer.blocks.len() {
                return Ok(None);
            }
            let block = self.next_block;
            self.next_block += 1;

            if let Some(p) = &self.predicate {
                if !p.may_match(&self.footer.blocks[block]) {
                    self.blocks_skipped += 1;
                    trace!(path = %self.path.display(), block, "block pruned by statistics");
                    continue;
                }
            }
            self.current = self.decode_block(block)?.into_iter();
            self.blocks_decoded += 1;
        }
    }

    fn decode_block(&mut self, block: usize) -> Result<Vec<Row>> {
        let row_count = self.footer.blocks[block].row_count as usize;
        let num_cols  = self.footer.schema.num_columns();
        let mut rows: Vec<Row> = (0..row_count).map(|_| Vec::with_capacity(num_cols)).collect();

        for col in 0..num_cols {
            let chunk = &self.footer.chunks[block][col];
            let meta  = &self.footer.schema.columns[col];

            let mut data = vec![0u8; chunk.size as usize];
            self.file.seek(SeekFrom::Start(chunk.offset))?;
            self.file.read_exact(&mut data)?;

            let mut filled = 0usize;
            for (start, end) in chunk.ordinal.page_ranges(chunk.size) {
                let page_bytes = data.get(start as usize..end as usize)
                    .ok_or_else(|| StoreError::SegmentIo(format!(
                        "{}: page range {start}..{end} outside column chunk", self.path.display()
                    )))?;
                let page = PageDecoder::decode(page_bytes, meta)?;
                if page.first_row_id as usize != filled {
                    return Err(StoreError::SegmentIo(format!(
                        "{}: column {} page starts at row {}, expected {filled}",
                        self.path.display(), meta.name, page.first_row_id
                    )));
                }
                for v in page.values {
                    let row = rows.get_mut(filled).ok_or_else(|| StoreError::SegmentIo(format!(
                        "{}: column {} has more values than block rows", self.path.display(), meta.name
                    )))?;
                    row.push(v);
                    filled += 1;
                }
            }
            if filled != row_count {
                return Err(StoreError::SegmentIo(format!(
                    "{}: column {} has {filled} values, block has {row_count} rows",
                    self.path.display(), meta.name
                )));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_type::{ColumnMeta, FieldType};
    use tempfile::TempDir;

    fn schema() -> RowSchema {
        RowSchema::new("events", vec![
            ColumnMeta::new(0, "seq", FieldType::Int64),
            ColumnMeta::new(1, "network", FieldType::Bytes).nullable(),
            ColumnMeta::new(2, "ok", FieldType::Bool),
        ])
    }

    fn row(seq: i64) -> Row {
        let network = match seq % 3 {
            0 => Value::string("BR"),
            1 => Value::string("AR"),
            _ => Value::Null,
        };
        vec![Value::Int64(seq), network, Value::Bool(seq % 2 == 0)]
    }

    fn write(path: &Path, n: i64, block_rows: usize) -> SegmentSummary {
        let opts = SegmentOptions::default().with_block_rows(block_rows);
        let mut w = SegmentWriter::create(path, schema(), opts).unwrap();
        for i in 0..n {
            w.append_row(row(i)).unwrap();
        }
        w.close().unwrap()
    }

    #[test]
    fn rows_come_back_in_write_order_across_blocks() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("a.seg");
        let summary = write(&path, 2500, 1000);
        assert_eq!(summary.rows, 2500);
        assert_eq!(summary.blocks, 3);

        let mut r = SegmentReader::open(&path, None).unwrap();
        let counts: Vec<u64> = r.block_statistics().iter().map(|b| b.row_count).collect();
        assert_eq!(counts, vec![1000, 1000, 500]);
        assert_eq!(r.num_rows(), 2500);
        assert_eq!(r.max_block_rows(), 1000);
        assert_eq!(r.blocks_decoded(), 0);

        let mut seq = 0;
        while let Some(got) = r.read_next().unwrap() {
            assert_eq!(got, row(seq));
            seq += 1;
            if seq == 1000 {
                assert_eq!(r.blocks_decoded(), 1);
            }
        }
        assert_eq!(seq, 2500);
        assert_eq!(r.blocks_decoded(), 3);
        assert!(r.read_next().unwrap().is_none());
    }

    #[test]
    fn predicate_prunes_blocks_and_filters_rows() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("b.seg");
        write(&path, 300, 100);

        let pred = Predicate::And(vec![
            Predicate::in_list("seq", vec![Value::Int64(5), Value::Int64(250)]),
            Predicate::eq("ok", Value::Bool(false)),
        ]);
        let mut r = SegmentReader::open(&path, Some(&pred)).unwrap();
        let mut hits = Vec::new();
        while let Some(got) = r.read_next().unwrap() {
            hits.push(got[0].clone());
        }
        assert_eq!(hits, vec![Value::Int64(5)]);
        // 块 [100,200) 的 min/max 排除了 5 与 250
        assert_eq!(r.blocks_skipped(), 1);
        assert_eq!(r.blocks_decoded(), 2);
    }

    #[test]
    fn existing_file_is_not_clobbered_without_overwrite() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("c.seg");
        write(&path, 1, 10);
        let err = SegmentWriter::create(&path, schema(), SegmentOptions::default());
        assert!(matches!(err, Err(StoreError::Io(_))));
        let ok = SegmentWriter::create(&path, schema(), SegmentOptions::default().overwrite());
        assert!(ok.is_ok());
    }

    #[test]
    fn corrupted_footer_is_detected() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("d.seg");
        let summary = write(&path, 50, 10);

        let mut bytes = std::fs::read(&path).unwrap();
        let at = (summary.bytes - TRAILER_LEN - 3) as usize;
        bytes[at] ^= 0x55;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(SegmentReader::open(&path, None), Err(StoreError::ChecksumMismatch)));
    }

    #[test]
    fn empty_segment_has_no_blocks() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("e.seg");
        let w = SegmentWriter::create(&path, schema(), SegmentOptions::default()).unwrap();
        let summary = w.close().unwrap();
        assert_eq!(summary.blocks, 0);
        let mut r = SegmentReader::open(&path, None).unwrap();
        assert_eq!(r.num_rows(), 0);
        assert!(r.read_next().unwrap().is_none());
    }
}
