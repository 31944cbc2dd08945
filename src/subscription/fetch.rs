// Fetch and filter capabilities.
// Async traits for producing a payload and transforming it before exposure.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;

use crate::error::{Result, SwrError};

/// Zero-argument async source of a payload.
///
/// Invoked again on every refresh, so it must be safe to repeat.
/// Any `Fn() -> impl Future<Output = Result<T, E>>` with `E: Display` is a
/// fetcher.
#[async_trait]
pub trait Fetch<T>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
}

#[async_trait]
impl<T, E, F, Fut> Fetch<T> for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    E: Display + 'static,
    T: Send + 'static,
{
    async fn fetch(&self) -> Result<T> {
        (self)().await.map_err(|e| SwrError::Fetch(e.to_string()))
    }
}

/// Pure transform applied to cached and fetched payloads alike.
///
/// Any `Fn(T) -> impl Future<Output = Result<T, E>>` with `E: Display` is a
/// filter.
#[async_trait]
pub trait Filter<T>: Send + Sync {
    async fn apply(&self, value: T) -> Result<T>;
}

#[async_trait]
impl<T, E, F, Fut> Filter<T> for F
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    E: Display + 'static,
    T: Send + 'static,
{
    async fn apply(&self, value: T) -> Result<T> {
        (self)(value)
            .await
            .map_err(|e| SwrError::Filter(e.to_string()))
    }
}
