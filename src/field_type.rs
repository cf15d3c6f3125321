//! Segment 列的物理字段类型、编码/压缩方式与运行时值

use serde::Deserialize;

/// 列在 Segment 文件中的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int32,
    Int64,
    /// 变长字节（UTF-8 字符串）
    Bytes,
}

impl FieldType {
    /// 固定字节宽度；变长类型返回 None
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bool  => Some(1),
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            Self::Bytes => None,
        }
    }
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Bool  => 0,
            Self::Int32 => 1,
            Self::Int64 => 2,
            Self::Bytes => 3,
        }
    }
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Bool),
            1 => Some(Self::Int32),
            2 => Some(Self::Int64),
            3 => Some(Self::Bytes),
            _ => None,
        }
    }
}

/// 编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingType {
    Plain,
    RunLength,
    DeltaBinary,
    Dictionary,
}

impl EncodingType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Plain       => 0,
            Self::RunLength   => 1,
            Self::DeltaBinary => 2,
            Self::Dictionary  => 3,
        }
    }
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Plain),
            1 => Some(Self::RunLength),
            2 => Some(Self::DeltaBinary),
            3 => Some(Self::Dictionary),
            _ => None,
        }
    }
}

/// 压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    #[default]
    Lz4,
}

impl CompressionType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4  => 1,
        }
    }
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Lz4),
            _ => None,
        }
    }
}

/// 每列的元数据（写入 Footer）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub column_id:   u32,
    pub name:        String,
    pub field_type:  FieldType,
    pub is_nullable: bool,
    pub encoding:    EncodingType,
    pub compression: CompressionType,
    /// 是否为该列构建 BloomFilter（等值剪枝）
    pub bloom:       bool,
}

impl ColumnMeta {
    pub fn new(column_id: u32, name: &str, field_type: FieldType) -> Self {
        // 根据字段类型自动选择编码：整数用 Delta；字符串用字典；布尔用 RLE
        let encoding = match field_type {
            FieldType::Int32 | FieldType::Int64 => EncodingType::DeltaBinary,
            FieldType::Bytes                    => EncodingType::Dictionary,
            FieldType::Bool                     => EncodingType::RunLength,
        };
        Self {
            column_id, name: name.into(), field_type,
            is_nullable: false, encoding,
            compression: CompressionType::Lz4,
            bloom: field_type == FieldType::Bytes,
        }
    }

    pub fn with_encoding(mut self, enc: EncodingType) -> Self {
        self.encoding = enc; self
    }
    pub fn with_compression(mut self, comp: CompressionType) -> Self {
        self.compression = comp; self
    }
    pub fn nullable(mut self) -> Self {
        self.is_nullable = true; self
    }
    pub fn without_bloom(mut self) -> Self {
        self.bloom = false; self
    }

    /// 值是否可以写入本列
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null     => self.is_nullable,
            Value::Bool(_)  => self.field_type == FieldType::Bool,
            Value::Int32(_) => self.field_type == FieldType::Int32,
            Value::Int64(_) => self.field_type == FieldType::Int64,
            Value::Bytes(_) => self.field_type == FieldType::Bytes,
        }
    }
}

/// 列值（运行时表示）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
    /// 可选字符串：None 或 trim 后为空一律存为 Null
    pub fn optional_string(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some(t) if !t.is_empty() => Self::string(t),
            _                        => Self::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self { Self::Bool(b) => Some(*b), _ => None }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_i32(&self) -> Option<i32> {
        match self { Self::Int32(v) => Some(*v), _ => None }
    }
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self { Self::Bytes(b) => Some(b), _ => None }
    }
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// 将值序列化为用于索引比较的字节串
    ///
    /// 同类型值的字节序与值序一致：有符号整数翻转符号位后按大端写出。
    pub fn to_sort_key(&self) -> Vec<u8> {
        match self {
            Self::Null     => vec![],
            Self::Bool(b)  => vec![*b as u8],
            Self::Int32(v) => ((*v as u32) ^ (1 << 31)).to_be_bytes().to_vec(),
            Self::Int64(v) => ((*v as u64) ^ (1 << 63)).to_be_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null     => write!(f, "NULL"),
            Self::Bool(v)  => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}
