//! 压缩/解压（LZ4 / None）

use crate::common::{Result, StoreError};
use crate::field_type::CompressionType;

pub fn compress(data: &[u8], codec: CompressionType) -> Result<Vec<u8>> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4  => {
            if data.is_empty() { return Ok(vec![]); }
            lz4::block::compress(data, None, false)
                .map_err(|e| StoreError::Compression(e.to_string()))
        }
    }
}

pub fn decompress(
    data:             &[u8],
    codec:            CompressionType,
    uncompressed_len: usize,
) -> Result<Vec<u8>> {
    match codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4  => {
            if uncompressed_len == 0 { return Ok(vec![]); }
            let size = i32::try_from(uncompressed_len)
                .map_err(|_| StoreError::Compression(format!("page too large: {uncompressed_len}")))?;
            lz4::block::decompress(data, Some(size))
                .map_err(|e| StoreError::Compression(e.to_string()))
        }
    }
}
