// Subscription controller.
// Serves cached data by freshness, refreshes stale entries in the background,
// and suppresses state updates once the consumer deactivates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::freshness::{Freshness, Thresholds};

use super::fetch::{Fetch, Filter};
use super::state::{Phase, SubscriptionState};

/// Bounds every cached payload type satisfies.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// What one activation subscribes to: a key, how to fetch it, an optional
/// filter, and freshness thresholds.
pub struct SubscriptionConfig<T> {
    key: String,
    fetcher: Arc<dyn Fetch<T>>,
    filter: Option<Arc<dyn Filter<T>>>,
    thresholds: Thresholds,
}

impl<T> Clone for SubscriptionConfig<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            filter: self.filter.clone(),
            thresholds: self.thresholds,
        }
    }
}

impl<T: Send + 'static> SubscriptionConfig<T> {
    pub fn new(key: impl Into<String>, fetcher: impl Fetch<T> + 'static) -> Self {
        Self {
            key: key.into(),
            fetcher: Arc::new(fetcher),
            filter: None,
            thresholds: Thresholds::default(),
        }
    }

    /// Apply `filter` to every payload before it is exposed.
    pub fn with_filter(mut self, filter: impl Filter<T> + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn refetch_after(mut self, age: Duration) -> Self {
        self.thresholds.refetch_after = age;
        self
    }

    pub fn invalid_after(mut self, age: Duration) -> Self {
        self.thresholds.invalid_after = age;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    async fn filtered(&self, value: T) -> Result<T> {
        match &self.filter {
            Some(filter) => filter.apply(value).await,
            None => Ok(value),
        }
    }
}

struct Activation {
    token: CancellationToken,
    refresh: Option<JoinHandle<()>>,
}

/// Drives one cache-backed subscription.
///
/// Each activation gets its own cancellation token. Starting a new
/// activation or deactivating cancels the previous token, after which that
/// activation's in-flight work still completes and still writes the store
/// but no longer touches the exposed state.
pub struct SubscriptionController<T> {
    store: CacheStore,
    config: Mutex<Arc<SubscriptionConfig<T>>>,
    state: Arc<watch::Sender<SubscriptionState<T>>>,
    activation: Mutex<Activation>,
    force: AtomicBool,
}

impl<T: Payload> SubscriptionController<T> {
    pub fn new(store: CacheStore, config: SubscriptionConfig<T>) -> Self {
        let (state, _) = watch::channel(SubscriptionState::default());
        Self {
            store,
            config: Mutex::new(Arc::new(config)),
            state: Arc::new(state),
            activation: Mutex::new(Activation {
                token: CancellationToken::new(),
                refresh: None,
            }),
            force: AtomicBool::new(false),
        }
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SubscriptionState<T>> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SubscriptionState<T> {
        self.state.borrow().clone()
    }

    pub fn config(&self) -> Arc<SubscriptionConfig<T>> {
        Arc::clone(&self.config.lock())
    }

    /// Run one activation and return how the cached entry was classified.
    ///
    /// Returns once data or an error is exposed. A stale entry is served
    /// immediately and refreshed by a spawned task; see [`Self::settled`].
    pub async fn activate(&self) -> Freshness {
        let token = self.begin_activation();
        let force = self.force.swap(false, Ordering::SeqCst);
        let config = self.config();
        let key = config.key();

        publish(&self.state, &token, SubscriptionState::begin_loading);
        if force {
            info!(key = %key, "force refetch");
        }

        let cached = self.store.get::<T>(key).await;
        let freshness = config
            .thresholds
            .classify(cached.as_ref().map(|c| c.age), force);
        debug!(key = %key, ?freshness, "classified cache entry");

        match cached {
            Some(cached) if freshness.is_servable() => {
                let phase = match freshness {
                    Freshness::Stale => Phase::ServingStale,
                    _ => Phase::ServingFresh,
                };

                match config.filtered(cached.payload).await {
                    Ok(data) => {
                        publish(&self.state, &token, |s| s.serve(data, phase));
                    }
                    Err(e) => {
                        publish(&self.state, &token, |s| s.fail(e.to_string()));
                        return freshness;
                    }
                }

                if freshness == Freshness::Stale {
                    let handle = tokio::spawn(refresh(
                        self.store.clone(),
                        Arc::clone(&config),
                        Arc::clone(&self.state),
                        token.clone(),
                    ));
                    let mut activation = self.activation.lock();
                    if !token.is_cancelled() {
                        activation.refresh = Some(handle);
                    }
                }
            }
            _ => {
                info!(key = %key, "no usable cache entry, fetching");
                match fetch_and_store(&self.store, &config).await {
                    Ok(data) => {
                        publish(&self.state, &token, |s| s.serve(data, Phase::ServingFresh));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "fetch failed");
                        publish(&self.state, &token, |s| s.fail(e.to_string()));
                    }
                }
            }
        }

        freshness
    }

    /// Activate with the refetch threshold treated as zero.
    pub async fn force_refetch(&self) -> Freshness {
        self.force.store(true, Ordering::SeqCst);
        self.activate().await
    }

    /// Swap the configuration (a dependency change) and re-activate.
    pub async fn reconfigure(&self, config: SubscriptionConfig<T>) -> Freshness {
        *self.config.lock() = Arc::new(config);
        self.activate().await
    }

    /// Stop exposing updates. In-flight fetches still complete and persist.
    pub fn deactivate(&self) {
        self.activation.lock().token.cancel();
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.phase = Phase::TornDown;
        });
    }

    /// Wait for the current background refresh, if any.
    #[allow(clippy::collapsible_if)]
    pub async fn settled(&self) {
        let handle = self.activation.lock().refresh.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "background refresh task failed");
            }
        }
    }

    fn begin_activation(&self) -> CancellationToken {
        let mut activation = self.activation.lock();
        activation.token.cancel();
        activation.token = CancellationToken::new();
        activation.refresh = None;
        activation.token.clone()
    }
}

impl<T> Drop for SubscriptionController<T> {
    fn drop(&mut self) {
        self.activation.get_mut().token.cancel();
    }
}

/// Apply `update` unless the activation was torn down.
/// The check runs under the channel's write lock.
fn publish<T>(
    state: &watch::Sender<SubscriptionState<T>>,
    token: &CancellationToken,
    update: impl FnOnce(&mut SubscriptionState<T>),
) -> bool {
    state.send_if_modified(|s| {
        if token.is_cancelled() {
            return false;
        }
        update(s);
        true
    })
}

/// Fetch, persist the raw payload, then filter it for exposure.
async fn fetch_and_store<T: Payload>(
    store: &CacheStore,
    config: &SubscriptionConfig<T>,
) -> Result<T> {
    let payload = config.fetcher.fetch().await?;
    store.set(config.key(), &payload).await;
    config.filtered(payload).await
}

async fn refresh<T: Payload>(
    store: CacheStore,
    config: Arc<SubscriptionConfig<T>>,
    state: Arc<watch::Sender<SubscriptionState<T>>>,
    token: CancellationToken,
) {
    let key = config.key();
    info!(key = %key, "cache is stale, refreshing in background");

    match fetch_and_store(&store, &config).await {
        Ok(data) => {
            if !publish(&state, &token, |s| s.serve(data, Phase::ServingFresh)) {
                debug!(key = %key, "refresh finished after teardown");
            }
        }
        Err(e) => {
            warn!(key = %key, error = %e, "background refresh failed");
            publish(&state, &token, |s| s.fail(e.to_string()));
        }
    }
}
