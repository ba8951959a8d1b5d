//! Salted password digests stored as the opaque user credential.
//!
//! Format: `sha256$<salt>$<hex digest of salt || 0x1f || password>`.

use sha2::{Digest, Sha256};
use uuid::Uuid;

const SCHEME: &str = "sha256";
const SEP: u8 = 0x1f;

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update([SEP]);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest `password` under a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}${}", SCHEME, salt, digest(&salt, password))
}
