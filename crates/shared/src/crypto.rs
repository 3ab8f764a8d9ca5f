//! API key hashing helpers.

use sha2::{Digest, Sha256};

/// Prefix every API key starts with.
pub const API_KEY_PREFIX: &str = "au_";

/// Length of the identifying prefix stored next to the hash.
const KEY_PREFIX_LEN: usize = 8;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a presented key has the expected shape (`au_` plus at least 8 chars).
pub fn is_well_formed_api_key(key: &str) -> bool {
    key.starts_with(API_KEY_PREFIX) && key.len() >= API_KEY_PREFIX.len() + KEY_PREFIX_LEN
}

/// Extracts the identifying prefix from an API key (first 8 characters after "au_").
pub fn extract_key_prefix(key: &str) -> Option<&str> {
    if is_well_formed_api_key(key) {
        key.get(API_KEY_PREFIX.len()..API_KEY_PREFIX.len() + KEY_PREFIX_LEN)
    } else {
        None
    }
}
