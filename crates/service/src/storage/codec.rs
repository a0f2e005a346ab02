//! Encoding of stored payloads.
//!
//! Values are compact JSON objects `{"email": .., "age": ..}`. The record name
//! is the key and never appears in the value.

use models::{User, UserInfo};

use super::error::StoreError;

pub fn encode(info: &UserInfo) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(info).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Decode the value stored under `key` and re-attach the name.
/// A present value that does not decode is corruption, not a normal error.
pub fn decode(key: &str, raw: &[u8]) -> Result<User, StoreError> {
    let info: UserInfo = serde_json::from_slice(raw).map_err(|e| StoreError::Corruption {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(User::from_parts(key, info))
}
