//! 列编码
//!
//! 支持四种编码：
//! - **Plain**      — 原始字节，无转换
//! - **RunLength**  — (count, value) 对，适合布尔/低基数列
//! - **DeltaBinary**— 有序整数增量编码，压缩时间戳/ID 列
//! - **Dictionary** — 字典编码，低基数字符串列（network、origin 等）节省大量空间
//!
//! 编码只处理非空值；null 由页头的 null bitmap 表示。

use std::collections::HashMap;
use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::common::{Result, StoreError};
use crate::field_type::{EncodingType, FieldType, Value};

// ── 统一编/解码入口 ───────────────────────────────────────────────────────────

pub fn encode(values: &[Value], enc: EncodingType, ft: FieldType) -> Result<Vec<u8>> {
    match enc {
        EncodingType::Plain       => plain::encode(values, ft),
        EncodingType::RunLength   => rle::encode(values, ft),
        EncodingType::DeltaBinary => delta::encode(values, ft),
        EncodingType::Dictionary  => dict::encode(values),
    }
}

pub fn decode(data: &[u8], enc: EncodingType, ft: FieldType, count: usize) -> Result<Vec<Value>> {
    let values = match enc {
        EncodingType::Plain       => plain::decode(data, ft, count),
        EncodingType::RunLength   => rle::decode(data, ft, count),
        EncodingType::DeltaBinary => delta::decode(data, ft, count),
        EncodingType::Dictionary  => dict::decode(data, ft, count),
    }?;
    if values.len() != count {
        return Err(StoreError::Encoding(format!(
            "{enc:?}: expected {count} values, decoded {}", values.len()
        )));
    }
    Ok(values)
}

fn truncated(e: io::Error) -> StoreError {
    StoreError::Encoding(format!("truncated column data: {e}"))
}

fn type_error(ft: FieldType, v: &Value) -> StoreError {
    StoreError::Encoding(format!("value {v:?} does not fit column type {ft:?}"))
}

fn write_scalar(out: &mut Vec<u8>, v: &Value, ft: FieldType) -> Result<()> {
    match (ft, v) {
        (FieldType::Bool,  Value::Bool(b))  => out.write_u8(*b as u8)?,
        (FieldType::Int32, Value::Int32(x)) => out.write_i32::<LittleEndian>(*x)?,
        (FieldType::Int64, Value::Int64(x)) => out.write_i64::<LittleEndian>(*x)?,
        (FieldType::Bytes, Value::Bytes(b)) => {
            out.write_u32::<LittleEndian>(b.len() as u32)?;
            out.extend_from_slice(b);
        }
        _ => return Err(type_error(ft, v)),
    }
    Ok(())
}

fn read_scalar(cur: &mut Cursor<&[u8]>, ft: FieldType) -> Result<Value> {
    let v = match ft {
        FieldType::Bool  => Value::Bool(cur.read_u8().map_err(truncated)? != 0),
        FieldType::Int32 => Value::Int32(cur.read_i32::<LittleEndian>().map_err(truncated)?),
        FieldType::Int64 => Value::Int64(cur.read_i64::<LittleEndian>().map_err(truncated)?),
        FieldType::Bytes => Value::Bytes(read_bytes(cur)?),
    };
    Ok(v)
}

fn read_bytes(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len   = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let start = cur.position() as usize;
    let data  = *cur.get_ref();
    if start + len > data.len() {
        return Err(StoreError::Encoding("byte string overruns buffer".into()));
    }
    cur.set_position((start + len) as u64);
    Ok(data[start..start + len].to_vec())
}

// ── Plain ─────────────────────────────────────────────────────────────────────
mod plain {
    use super::*;

    pub fn encode(values: &[Value], ft: FieldType) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(values.len() * ft.fixed_size().unwrap_or(16));
        for v in values {
            write_scalar(&mut out, v, ft)?;
        }
        Ok(out)
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize) -> Result<Vec<Value>> {
        let mut cur = Cursor::new(data);
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            out.push(read_scalar(&mut cur, ft)?);
        }
        Ok(out)
    }
}

// ── Run-Length Encoding ───────────────────────────────────────────────────────
mod rle {
    use super::*;

    pub fn encode(values: &[Value], ft: FieldType) -> Result<Vec<u8>> {
        if values.is_empty() { return Ok(vec![]); }
        let mut out = Vec::new();
        let mut cur = &values[0];
        let mut run: u32 = 1;

        for v in &values[1..] {
            if v == cur {
                run += 1;
            } else {
                write_run(&mut out, run, cur, ft)?;
                cur = v;
                run = 1;
            }
        }
        write_run(&mut out, run, cur, ft)?;
        Ok(out)
    }

    fn write_run(out: &mut Vec<u8>, run: u32, v: &Value, ft: FieldType) -> Result<()> {
        out.write_u32::<LittleEndian>(run)?;
        write_scalar(out, v, ft)
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize) -> Result<Vec<Value>> {
        let mut cur = Cursor::new(data);
        let mut out = Vec::with_capacity(count);
        while (cur.position() as usize) < data.len() {
            let run = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let val = read_scalar(&mut cur, ft)?;
            if out.len() + run > count {
                return Err(StoreError::Encoding("rle: run exceeds page value count".into()));
            }
            out.extend(std::iter::repeat(val).take(run));
        }
        Ok(out)
    }
}

// ── Delta Binary ──────────────────────────────────────────────────────────────
mod delta {
    use super::*;

    pub fn encode(values: &[Value], ft: FieldType) -> Result<Vec<u8>> {
        if !ft.is_integer() {
            return Err(StoreError::Encoding(format!("delta: {ft:?} is not an integer type")));
        }
        let ints = values.iter()
            .map(|v| v.as_i64().ok_or_else(|| type_error(ft, v)))
            .collect::<Result<Vec<i64>>>()?;
        if ints.is_empty() { return Ok(vec![]); }

        let mut out = Vec::with_capacity(ints.len() * 8);
        out.write_i64::<LittleEndian>(ints[0])?; // base
        let mut prev = ints[0];
        for &x in &ints[1..] {
            out.write_i64::<LittleEndian>(x.wrapping_sub(prev))?;
            prev = x;
        }
        Ok(out)
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(count);
        if count == 0 { return Ok(out); }
        let mut cur  = Cursor::new(data);
        let mut prev = cur.read_i64::<LittleEndian>().map_err(truncated)?;
        out.push(widen(prev, ft)?);
        while out.len() < count {
            let delta = cur.read_i64::<LittleEndian>().map_err(truncated)?;
            prev = prev.wrapping_add(delta);
            out.push(widen(prev, ft)?);
        }
        Ok(out)
    }

    fn widen(x: i64, ft: FieldType) -> Result<Value> {
        match ft {
            FieldType::Int64 => Ok(Value::Int64(x)),
            FieldType::Int32 => i32::try_from(x)
                .map(Value::Int32)
                .map_err(|_| StoreError::Encoding(format!("delta: {x} overflows Int32"))),
            _ => Err(StoreError::Encoding(format!("delta: {ft:?} is not an integer type"))),
        }
    }
}

// ── Dictionary ────────────────────────────────────────────────────────────────
mod dict {
    use super::*;

    pub fn encode(values: &[Value]) -> Result<Vec<u8>> {
        let mut dict:  Vec<&[u8]>             = Vec::new();
        let mut codes: Vec<u32>               = Vec::with_capacity(values.len());
        let mut seen:  HashMap<&[u8], u32>    = HashMap::new();

        for v in values {
            let key = v.as_bytes().ok_or_else(|| type_error(FieldType::Bytes, v))?;
            let idx = *seen.entry(key).or_insert_with(|| {
                dict.push(key);
                (dict.len() - 1) as u32
            });
            codes.push(idx);
        }

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(dict.len() as u32)?;
        for entry in &dict {
            out.write_u32::<LittleEndian>(entry.len() as u32)?;
            out.extend_from_slice(entry);
        }
        for c in &codes {
            out.write_u32::<LittleEndian>(*c)?;
        }
        Ok(out)
    }

    pub fn decode(data: &[u8], ft: FieldType, count: usize) -> Result<Vec<Value>> {
        if ft != FieldType::Bytes {
            return Err(StoreError::Encoding(format!("dict: {ft:?} is not a byte column")));
        }
        let mut out = Vec::with_capacity(count);
        if count == 0 { return Ok(out); }

        let mut cur  = Cursor::new(data);
        let dict_len = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let mut dict: Vec<Vec<u8>> = Vec::with_capacity(dict_len);
        for _ in 0..dict_len {
            dict.push(read_bytes(&mut cur)?);
        }

        for _ in 0..count {
            let code = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let entry = dict.get(code)
                .ok_or_else(|| StoreError::Encoding(format!("dict: code {code} out of range")))?;
            out.push(Value::Bytes(entry.clone()));
        }
        Ok(out)
    }
}
