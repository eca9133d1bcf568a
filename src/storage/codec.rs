use super::error::{StorageError, StorageResult};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Encodes an embedding as little-endian f32 bytes.
pub fn embedding_to_le_bytes(values: &[f32]) -> Vec<u8> {
    #[cfg(target_endian = "little")]
    {
        bytemuck::cast_slice::<f32, u8>(values).to_vec()
    }
    #[cfg(not(target_endian = "little"))]
    {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Decodes little-endian f32 bytes produced by [`embedding_to_le_bytes`].
pub fn embedding_from_le_bytes(bytes: &[u8]) -> StorageResult<Vec<f32>> {
    if !bytes.len().is_multiple_of(F32_BYTES) {
        return Err(StorageError::InvalidEmbeddingBytes { len: bytes.len() });
    }

    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
