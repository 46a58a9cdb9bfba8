//! Keyed request cache with de-duplication, stale-while-revalidate and invalidation.
//!
//! Each key owns one slot holding a `watch` channel with the current [`CacheEntry`].
//! Subscribers observe the channel through a [`Subscription`]; dropping the last one
//! detaches the slot. Detached entries that hold data or an error are parked in a moka
//! cache for `gc_time` and revived on the next subscription.
//!
//! Invariants:
//! - at most one request per key is current; a newer request supersedes (and cancels) the
//!   older one, and only the current request may settle the entry
//! - a cancelled request restores the status the entry had before it started
//! - subscriptions are bound to the slot instance they attached to, so a subscription that
//!   outlives a `clear()` or an eviction never touches a newer slot
//!
//! The slot map sits behind a `parking_lot::Mutex` that is never held across an await.
//! Fetches run as spawned tokio tasks, so subscribing requires a runtime context.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use marquee_shared::ClientError;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::key::CacheKey;

pub type FetchFuture<T> = BoxFuture<'static, Result<T, ClientError>>;

/// Produces a fetch for a key. The token is cancelled when the request is no longer wanted.
pub type FetchFn<T> = Arc<dyn Fn(CancellationToken) -> FetchFuture<T> + Send + Sync>;

/// A cache key paired with the function that fetches it.
pub struct Query<T> {
    pub key: CacheKey,
    pub fetch: FetchFn<T>,
}

impl<T> Query<T> {
    pub fn new<F, Fut>(key: CacheKey, fetch: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        Self {
            key,
            fetch: Arc::new(move |cancel| fetch(cancel).boxed()),
        }
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetch: Arc::clone(&self.fetch),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Observable state of one key.
///
/// `data` survives refetches and failures, so a view can keep rendering the last good
/// value while `status` is `Loading` or `Error`.
pub struct CacheEntry<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ClientError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub subscriber_count: usize,
    /// True while a request for this key is in flight, including background revalidation.
    pub is_fetching: bool,
}

impl<T> CacheEntry<T> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            subscriber_count: 0,
            is_fetching: false,
        }
    }

    /// Loading with nothing to show yet.
    pub fn is_initial_load(&self) -> bool {
        self.status == QueryStatus::Loading && self.data.is_none()
    }
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            subscriber_count: self.subscriber_count,
            is_fetching: self.is_fetching,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error", &self.error)
            .field("last_fetched_at", &self.last_fetched_at)
            .field("subscriber_count", &self.subscriber_count)
            .field("is_fetching", &self.is_fetching)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How long a successful fetch counts as fresh. Zero revalidates on every new subscription.
    pub stale_time: Duration,
    /// How long a detached entry is retained. Zero drops it immediately.
    pub gc_time: Duration,
    /// Upper bound on retained detached entries.
    pub max_retained: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(300),
            max_retained: 1_000,
        }
    }
}

struct InFlight {
    request_id: u64,
    cancel: CancellationToken,
    /// Status before the first of a chain of superseding requests started.
    prior: QueryStatus,
}

struct Slot<T> {
    id: u64,
    tx: watch::Sender<CacheEntry<T>>,
    fetch: FetchFn<T>,
    subscribers: usize,
    fresh_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<InFlight>,
}

impl<T> Slot<T> {
    fn new(id: u64, fetch: FetchFn<T>, parked: Option<Parked<T>>) -> Self {
        let (entry, fresh_at, invalidated) = match parked {
            Some(p) => (p.entry, p.fresh_at, p.invalidated),
            None => (CacheEntry::idle(), None, false),
        };
        let (tx, _) = watch::channel(entry);
        Self {
            id,
            tx,
            fetch,
            subscribers: 0,
            fresh_at,
            invalidated,
            in_flight: None,
        }
    }

    fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fresh_at {
            Some(at) => now.duration_since(at) >= stale_time,
            None => true,
        }
    }
}

/// A detached entry waiting in the retention cache.
struct Parked<T> {
    entry: CacheEntry<T>,
    fresh_at: Option<Instant>,
    invalidated: bool,
}

impl<T> Clone for Parked<T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            fresh_at: self.fresh_at,
            invalidated: self.invalidated,
        }
    }
}

struct State<T> {
    slots: HashMap<CacheKey, Slot<T>>,
    next_request_id: u64,
    next_slot_id: u64,
}

struct Inner<T> {
    options: CacheOptions,
    state: Mutex<State<T>>,
    retained: Option<moka::sync::Cache<CacheKey, Parked<T>>>,
}

/// A cache of values of one type, keyed by [`CacheKey`]. Cloning shares the cache.
pub struct QueryCache<T: Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + Sync + 'static> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for QueryCache<T> {
    fn default() -> Self {
        Self::new(CacheOptions::default())
    }
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    pub fn new(options: CacheOptions) -> Self {
        let retained = (!options.gc_time.is_zero()).then(|| {
            moka::sync::Cache::builder()
                .time_to_live(options.gc_time)
                .max_capacity(options.max_retained)
                .build()
        });

        Self {
            inner: Arc::new(Inner {
                options,
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    next_request_id: 0,
                    next_slot_id: 0,
                }),
                retained,
            }),
        }
    }

    /// Subscribes to a query.
    ///
    /// Creates the entry and starts a fetch if none exists; attaches to an in-flight fetch
    /// if there is one; starts a background revalidation if the entry is stale; otherwise
    /// serves the cached entry without a request.
    pub fn subscribe(&self, query: Query<T>) -> Subscription<T> {
        let Query { key, fetch } = query;
        let now = Instant::now();
        let inner = &self.inner;

        let mut guard = inner.state.lock();
        let state = &mut *guard;

        let slot = match state.slots.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                state.next_slot_id += 1;
                let parked = inner.revive(&key);
                if parked.is_some() {
                    tracing::debug!(key = %key, "revived retained entry");
                }
                vacant.insert(Slot::new(state.next_slot_id, fetch.clone(), parked))
            }
        };

        slot.subscribers += 1;
        slot.fetch = fetch;
        let subscribers = slot.subscribers;
        slot.tx.send_modify(|e| e.subscriber_count = subscribers);

        if slot.in_flight.is_some() {
            tracing::debug!(key = %key, subscribers = subscribers, "attached to in-flight request");
        } else if slot.is_stale(inner.options.stale_time, now) {
            state.next_request_id += 1;
            inner.start_fetch(&key, slot, state.next_request_id);
        } else {
            tracing::debug!(key = %key, subscribers = subscribers, "cache hit");
        }

        let rx = slot.tx.subscribe();
        let slot_id = slot.id;
        drop(guard);

        Subscription {
            key,
            slot_id,
            rx,
            cache: self.clone(),
        }
    }

    /// Marks every entry under `prefix` stale. Observed entries refetch at once; detached
    /// entries are evicted. Returns the number of refetches started.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let inner = &self.inner;
        let mut refetched = 0;

        {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            for (key, slot) in state.slots.iter_mut() {
                if !key.starts_with(prefix) {
                    continue;
                }
                slot.invalidated = true;
                if slot.subscribers > 0 {
                    state.next_request_id += 1;
                    inner.start_fetch(key, slot, state.next_request_id);
                    refetched += 1;
                }
            }
        }

        let mut evicted = 0;
        if let Some(retained) = &inner.retained {
            let doomed: Vec<Arc<CacheKey>> = retained
                .iter()
                .map(|(k, _)| k)
                .filter(|k| k.starts_with(prefix))
                .collect();
            evicted = doomed.len();
            for key in doomed {
                retained.invalidate(key.as_ref());
            }
        }

        tracing::debug!(
            prefix = %prefix,
            refetched = refetched,
            evicted = evicted,
            "invalidated"
        );
        refetched
    }

    /// Starts a new request for an observed key, superseding any in-flight one.
    /// Returns false when nobody observes the key.
    pub fn refetch(&self, key: &CacheKey) -> bool {
        let inner = &self.inner;
        let mut guard = inner.state.lock();
        let state = &mut *guard;
        match state.slots.get_mut(key) {
            Some(slot) if slot.subscribers > 0 => {
                state.next_request_id += 1;
                inner.start_fetch(key, slot, state.next_request_id);
                true
            }
            _ => false,
        }
    }

    /// Cancels the in-flight request for `key`, restoring the entry's pre-fetch status.
    /// Returns false when nothing was in flight.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        let mut state = self.inner.state.lock();
        match state.slots.get_mut(key) {
            Some(slot) => slot.abort_in_flight(key),
            None => false,
        }
    }

    /// Current entry for `key`, whether observed or retained.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        if let Some(slot) = self.inner.state.lock().slots.get(key) {
            return Some(slot.tx.borrow().clone());
        }
        self.inner
            .retained
            .as_ref()
            .and_then(|r| r.get(key))
            .map(|p| p.entry)
    }

    /// Drops every entry, cancelling in-flight requests. Existing subscriptions keep their
    /// last snapshot but receive no further updates.
    pub fn clear(&self) {
        let slots: Vec<(CacheKey, Slot<T>)> = self.inner.state.lock().slots.drain().collect();
        let dropped = slots.len();
        for (_, slot) in slots {
            if let Some(flight) = slot.in_flight {
                flight.cancel.cancel();
            }
        }
        if let Some(retained) = &self.inner.retained {
            retained.invalidate_all();
        }
        tracing::debug!(dropped = dropped, "cache cleared");
    }

    /// Number of keys with at least one subscriber.
    pub fn observed_len(&self) -> usize {
        self.inner.state.lock().slots.len()
    }
}

impl<T> Slot<T> {
    fn abort_in_flight(&mut self, key: &CacheKey) -> bool {
        let Some(flight) = self.in_flight.take() else {
            return false;
        };
        flight.cancel.cancel();
        self.tx.send_modify(|e| {
            e.status = flight.prior;
            e.is_fetching = false;
        });
        tracing::debug!(key = %key, request_id = flight.request_id, "request cancelled");
        true
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn start_fetch(self: &Arc<Self>, key: &CacheKey, slot: &mut Slot<T>, request_id: u64) {
        let prior = match slot.in_flight.take() {
            Some(previous) => {
                previous.cancel.cancel();
                tracing::debug!(
                    key = %key,
                    superseded = previous.request_id,
                    request_id = request_id,
                    "request superseded"
                );
                previous.prior
            }
            None => slot.tx.borrow().status,
        };

        let cancel = CancellationToken::new();
        slot.in_flight = Some(InFlight {
            request_id,
            cancel: cancel.clone(),
            prior,
        });
        slot.tx.send_modify(|e| {
            e.status = QueryStatus::Loading;
            e.is_fetching = true;
        });

        tracing::debug!(key = %key, request_id = request_id, "fetch started");

        let fetch = (slot.fetch)(cancel);
        let inner = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            inner.settle(&key, request_id, result);
        });
    }

    fn settle(&self, key: &CacheKey, request_id: u64, result: Result<T, ClientError>) {
        let mut state = self.state.lock();

        let Some(slot) = state.slots.get_mut(key) else {
            tracing::debug!(key = %key, request_id = request_id, "response for detached key discarded");
            return;
        };

        let flight = match slot.in_flight.take() {
            Some(flight) if flight.request_id == request_id => flight,
            other => {
                slot.in_flight = other;
                tracing::debug!(key = %key, request_id = request_id, "stale response discarded");
                return;
            }
        };

        match result {
            Ok(data) => {
                slot.fresh_at = Some(Instant::now());
                slot.invalidated = false;
                slot.tx.send_modify(|e| {
                    e.status = QueryStatus::Success;
                    e.data = Some(Arc::new(data));
                    e.error = None;
                    e.last_fetched_at = Some(Utc::now());
                    e.is_fetching = false;
                });
                tracing::debug!(key = %key, request_id = request_id, outcome = "success", "fetch settled");
            }
            Err(ClientError::Cancelled) => {
                slot.tx.send_modify(|e| {
                    e.status = flight.prior;
                    e.is_fetching = false;
                });
                tracing::debug!(key = %key, request_id = request_id, outcome = "cancelled", "fetch settled");
            }
            Err(error) => {
                tracing::warn!(
                    key = %key,
                    request_id = request_id,
                    outcome = "error",
                    error = %error,
                    "fetch failed"
                );
                slot.tx.send_modify(|e| {
                    e.status = QueryStatus::Error;
                    e.error = Some(error);
                    e.is_fetching = false;
                });
            }
        }
    }

    /// Drops one subscriber from slot `slot_id`. The last one detaches the slot, cancelling
    /// any in-flight request and parking whatever the entry holds.
    fn release(&self, key: &CacheKey, slot_id: u64) {
        let mut state = self.state.lock();

        let remaining = match state.slots.get_mut(key) {
            Some(slot) if slot.id == slot_id => {
                slot.subscribers = slot.subscribers.saturating_sub(1);
                let remaining = slot.subscribers;
                slot.tx.send_modify(|e| e.subscriber_count = remaining);
                remaining
            }
            _ => return,
        };
        if remaining > 0 {
            return;
        }

        // Parked before the lock is released, so a concurrent subscribe either finds the
        // live slot or the retained entry.
        let Some(mut slot) = state.slots.remove(key) else {
            return;
        };
        slot.abort_in_flight(key);
        self.park(key, &slot);
    }

    fn park(&self, key: &CacheKey, slot: &Slot<T>) {
        let Some(retained) = &self.retained else {
            return;
        };
        let entry = slot.tx.borrow().clone();
        if entry.data.is_none() && entry.error.is_none() {
            return;
        }
        retained.insert(
            key.clone(),
            Parked {
                entry,
                fresh_at: slot.fresh_at,
                invalidated: slot.invalidated,
            },
        );
        tracing::debug!(key = %key, "entry detached and retained");
    }

    fn revive(&self, key: &CacheKey) -> Option<Parked<T>> {
        let retained = self.retained.as_ref()?;
        let mut parked = retained.get(key)?;
        retained.invalidate(key);
        parked.entry.subscriber_count = 0;
        parked.entry.is_fetching = false;
        Some(parked)
    }
}

/// A live view of one cache entry. Dropping it releases the subscription.
pub struct Subscription<T: Send + Sync + 'static> {
    key: CacheKey,
    slot_id: u64,
    rx: watch::Receiver<CacheEntry<T>>,
    cache: QueryCache<T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn snapshot(&self) -> CacheEntry<T> {
        self.rx.borrow().clone()
    }

    /// Waits for the next change. `None` once the entry is gone (after `clear()`).
    pub async fn changed(&mut self) -> Option<CacheEntry<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until no request for the key is in flight and returns the entry.
    pub async fn settled(&mut self) -> CacheEntry<T> {
        loop {
            let entry = self.rx.borrow_and_update().clone();
            if !entry.is_fetching {
                return entry;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    pub fn refetch(&self) -> bool {
        self.cache.refetch(&self.key)
    }

    /// Cancels the key's in-flight request. See [`QueryCache::cancel`].
    pub fn cancel(&self) -> bool {
        self.cache.cancel(&self.key)
    }
}

impl<T: Send + Sync + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.inner.release(&self.key, self.slot_id);
    }
}
