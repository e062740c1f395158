use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Opaque link mailed at signup; proves control of the registered address.
pub fn generate_activation_link() -> String {
    Uuid::new_v4().to_string()
}

/// 8-digit numeric one-time code, digits only for ease of manual entry.
/// Leading zeros are kept.
pub fn generate_reset_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{n:08}")
}

/// One-way fingerprint of a refresh token as stored on the record; the raw
/// token never touches the store.
pub fn refresh_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
