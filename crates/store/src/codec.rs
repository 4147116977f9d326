//! Artifact payload encoding: MessagePack compressed with zstd.
//!
//! Encoding is deterministic for deterministic inputs (no hash maps in
//! persisted types), so re-encoding the same value yields identical bytes.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

const ZSTD_LEVEL: i32 = 3;

/// Encode a value as zstd-compressed MessagePack. Returns (compressed, raw_len).
pub fn encode<T: Serialize>(value: &T) -> Result<(Vec<u8>, u64), StoreError> {
    let raw = rmp_serde::to_vec_named(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
    let compressed = zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)?;
    Ok((compressed, raw.len() as u64))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    let raw = zstd::decode_all(bytes)?;
    rmp_serde::from_slice(&raw).map_err(|e| StoreError::Deserialize(e.to_string()))
}
