//! Disk-backed stale-while-revalidate cache.
//!
//! [`CacheStore`] keeps one JSON file per key. [`SubscriptionController`]
//! serves cached data according to its age, refreshes stale entries in the
//! background, and stops touching consumer state once deactivated.

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod freshness;
pub mod http;
pub mod subscription;

pub use cache::{CacheStore, Cached, hash_record};
pub use config::CacheConfig;
pub use error::{Result, SwrError};
pub use freshness::{Freshness, Thresholds};
pub use subscription::{
    Fetch, Filter, Phase, SubscriptionConfig, SubscriptionController, SubscriptionState,
};
