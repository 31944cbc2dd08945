// Cache key derivation.
// Hashes a request's parameter set into a stable key under a namespace.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Derive a cache key from a namespace and a parameter record.
///
/// Parameters go through `serde_json::Value`, whose object maps keep keys
/// sorted, so field order never changes the key.
pub fn hash_record<P: Serialize + ?Sized>(namespace: &str, params: &P) -> Result<String> {
    let canonical = serde_json::to_value(params)?;
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    Ok(format!("{}_{}", namespace, hex::encode(digest)))
}
