//! ID generation for taskdeck entities
//!
//! IDs are opaque: 8 lowercase Crockford base32 chars derived from a random
//! UUID and the current timestamp. The store retries until the id has never
//! been used by a live or deleted entity.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const ID_BYTES: usize = 5;

/// Generate a fresh random id
pub fn generate_id() -> String {
    let uuid = Uuid::new_v4();
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(timestamp.to_le_bytes());

    let hash = hasher.finalize();

    // 5 bytes encode to exactly 8 base32 chars, no padding
    base32::encode(base32::Alphabet::Crockford, &hash[..ID_BYTES]).to_lowercase()
}

/// Generate an id for which `taken` returns false
pub fn generate_unique_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id();
        if !taken(&id) {
            return id;
        }
    }
}
