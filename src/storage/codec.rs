//! Binary encoding for stored embeddings
//!
//! Layout: a little-endian `u32` element count followed by that many
//! little-endian `f32` values. Decoding rejects truncated or oversized blobs
//! instead of guessing.

use crate::error::{KairosError, Result};

const LEN_PREFIX: usize = 4;
const F32_SIZE: usize = 4;

/// Encode an embedding as a length-prefixed blob
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(LEN_PREFIX + embedding.len() * F32_SIZE);
    bytes.extend_from_slice(&(embedding.len() as u32).to_le_bytes());
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a blob produced by [`encode_embedding`]
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < LEN_PREFIX {
        return Err(KairosError::Storage(format!(
            "embedding blob too short for length prefix ({} bytes)",
            bytes.len()
        )));
    }

    let (prefix, body) = bytes.split_at(LEN_PREFIX);
    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let declared = u32::from_le_bytes(len_bytes) as usize;

    let expected = declared.checked_mul(F32_SIZE).ok_or_else(|| {
        KairosError::Storage(format!("embedding length {} overflows", declared))
    })?;

    if body.len() != expected {
        return Err(KairosError::Storage(format!(
            "embedding blob declares {} values but carries {} bytes",
            declared,
            body.len()
        )));
    }

    Ok(body
        .chunks_exact(F32_SIZE)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let bytes = encode_embedding(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 4 + 8);
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_decode_recovers_values() {
        let original = vec![0.25, -0.5, 3.75, f32::MIN_POSITIVE];
        let decoded = decode_embedding(&encode_embedding(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_empty_embedding() {
        let decoded = decode_embedding(&encode_embedding(&[])).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        let mut bytes = encode_embedding(&[1.0, 2.0, 3.0]);
        bytes.pop();
        assert!(matches!(
            decode_embedding(&bytes),
            Err(KairosError::Storage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = encode_embedding(&[1.0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert!(decode_embedding(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_prefix() {
        assert!(decode_embedding(&[1, 2]).is_err());
    }

    #[test]
    fn test_decode_rejects_textual_encoding() {
        // A printed float list is not a valid blob
        assert!(decode_embedding(b"[0.1, 0.2, 0.3]").is_err());
    }
}
