// Cache module for local filesystem caching.
// Stores one JSON entry per key so fetched data survives restarts.

pub mod keys;
pub mod paths;
pub mod store;

pub use keys::hash_record;
pub use store::{CacheEntry, CacheStore, Cached, RECEIVE_MAX_AGE};
