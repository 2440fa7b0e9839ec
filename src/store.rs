//! Process-wide keyed cache store.
//!
//! The store is the single source of truth for all keyed query results
//! during the process lifetime. It is explicitly constructed and shared via
//! `Arc` (no ambient singleton), so tests can instantiate isolated stores.
//! Isolation between unrelated data is achieved purely through key
//! disjointness: one store serves every entity family.
//!
//! Entries are never mutated in place. Every write installs a new `Arc`, so
//! a previously read `Arc` is safe to hold as a rollback snapshot.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, trace};

use crate::error::SyncError;
use crate::key::CacheKey;

type Value = Arc<dyn Any + Send + Sync>;
type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Slot {
    value: Option<Value>,
    /// Bumped by `cancel_pending`; a fetch whose epoch no longer matches
    /// settles as a cache no-op.
    epoch: u64,
    /// Present while a fetch for this key is in flight. The receiver lets
    /// concurrent bindings wait for the leader's outcome instead of issuing
    /// a second remote call. Tagged with the epoch the fetch started under.
    inflight: Option<(u64, watch::Receiver<Option<FetchOutcome>>)>,
    /// Serializes mutations on this key across every engine that targets it.
    mutation_serial: Arc<AsyncMutex<()>>,
    listeners: Vec<(u64, Listener)>,
}

/// How a fetch settled. Broadcast to follower bindings waiting on the same
/// key, so a follower of a failing leader observes the failure.
#[derive(Clone)]
pub(crate) enum FetchOutcome {
    /// The result was written to the cache.
    Stored,
    /// The fetch failed; prior data was left intact.
    Failed(Arc<SyncError>),
    /// Superseded by `cancel_pending`; the result was discarded.
    Superseded,
}

/// Outcome of [`CacheStore::begin_fetch`]: either this caller performs the
/// fetch, or it waits on the in-flight one.
pub(crate) enum FetchTicket {
    Leader {
        epoch: u64,
        done: watch::Sender<Option<FetchOutcome>>,
    },
    Follower(watch::Receiver<Option<FetchOutcome>>),
}

pub struct CacheStore {
    slots: DashMap<CacheKey, Slot>,
    next_listener_id: AtomicU64,
}

impl CacheStore {
    pub fn new() -> Self {
        CacheStore {
            slots: DashMap::new(),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Read the entry under `key`, if present and of the requested type.
    pub fn get<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let value = self.slots.get(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Replace the entry wholesale and notify subscribers of `key`.
    pub fn set<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        self.set_value(key, Some(Arc::new(value) as Value));
    }

    /// Restore a snapshot previously obtained from [`CacheStore::get`].
    /// `None` removes the entry (the key held nothing before the snapshot).
    pub fn restore<T: Send + Sync + 'static>(&self, key: &CacheKey, snapshot: Option<Arc<T>>) {
        self.set_value(key, snapshot.map(|v| v as Value));
    }

    fn set_value(&self, key: &CacheKey, value: Option<Value>) {
        let listeners = {
            let mut slot = self.slots.entry(key.clone()).or_default();
            slot.value = value;
            collect_listeners(&slot)
        };
        trace!(key = %key, "cache entry written");
        notify(listeners);
    }

    /// Synchronous read-modify-write. The updater sees the current value (or
    /// `None`) and must return the next value without touching the store.
    pub fn update<T: Clone + Send + Sync + 'static>(
        &self,
        key: &CacheKey,
        updater: impl FnOnce(Option<&T>) -> T,
    ) {
        let listeners = {
            let mut slot = self.slots.entry(key.clone()).or_default();
            let prev = slot.value.clone().and_then(|v| v.downcast::<T>().ok());
            let next = updater(prev.as_deref());
            slot.value = Some(Arc::new(next) as Value);
            collect_listeners(&slot)
        };
        trace!(key = %key, "cache entry updated");
        notify(listeners);
    }

    /// Clear the entry for `key`, keeping its subscribers registered.
    pub fn remove(&self, key: &CacheKey) {
        let listeners = match self.slots.get_mut(key) {
            Some(mut slot) => {
                slot.value = None;
                collect_listeners(&slot)
            }
            None => return,
        };
        trace!(key = %key, "cache entry removed");
        notify(listeners);
    }

    /// Drop every entry (session teardown, e.g. logout). Subscribers stay
    /// registered and are notified once per key that held a value.
    pub fn clear(&self) {
        let mut listeners = Vec::new();
        for mut slot in self.slots.iter_mut() {
            if slot.value.take().is_some() {
                listeners.extend(collect_listeners(&slot));
            }
        }
        debug!("cache cleared");
        notify(listeners);
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener invoked after every `set`/`update`/`remove` on
    /// this exact key. The listener is removed when the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        key: &CacheKey,
        listener: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.slots
            .entry(key.clone())
            .or_default()
            .listeners
            .push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(self),
            key: key.clone(),
            id,
        }
    }

    /// Logically cancel any in-flight fetch for `key`: its eventual result
    /// will not be written to the cache. The underlying request is not
    /// aborted. Completion is guaranteed by the time this returns, so a
    /// mutation may take its snapshot immediately afterwards.
    pub fn cancel_pending(&self, key: &CacheKey) {
        let mut slot = self.slots.entry(key.clone()).or_default();
        slot.epoch += 1;
        slot.inflight = None;
        debug!(key = %key, epoch = slot.epoch, "pending fetches cancelled");
    }

    /// Lock serializing mutations for `key`. Every engine targeting the same
    /// key shares one lock, so a second mutation's snapshot is taken only
    /// after the first one settles.
    pub(crate) fn mutation_lock(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        self.slots
            .entry(key.clone())
            .or_default()
            .mutation_serial
            .clone()
    }

    /// Begin a fetch for `key`, de-duplicating against any fetch already in
    /// flight for the same key.
    pub(crate) fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        let mut slot = self.slots.entry(key.clone()).or_default();
        if let Some((_, rx)) = &slot.inflight {
            return FetchTicket::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        let epoch = slot.epoch;
        slot.inflight = Some((epoch, rx));
        trace!(key = %key, epoch, "fetch started");
        FetchTicket::Leader { epoch, done: tx }
    }

    /// Store a fetch result, unless the fetch was superseded by
    /// `cancel_pending` in the meantime. Returns whether the value was
    /// written.
    pub(crate) fn complete_fetch<T: Send + Sync + 'static>(
        &self,
        key: &CacheKey,
        epoch: u64,
        value: T,
    ) -> bool {
        let (wrote, listeners) = {
            let mut slot = self.slots.entry(key.clone()).or_default();
            if let Some((e, _)) = &slot.inflight
                && *e == epoch
            {
                slot.inflight = None;
            }
            if slot.epoch != epoch {
                trace!(key = %key, epoch, "stale fetch result ignored");
                (false, Vec::new())
            } else {
                slot.value = Some(Arc::new(value) as Value);
                (true, collect_listeners(&slot))
            }
        };
        notify(listeners);
        wrote
    }

    /// Mark a failed fetch as settled without touching the cached value.
    pub(crate) fn abort_fetch(&self, key: &CacheKey, epoch: u64) {
        if let Some(mut slot) = self.slots.get_mut(key)
            && let Some((e, _)) = &slot.inflight
            && *e == epoch
        {
            slot.inflight = None;
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered listener; unsubscribes on drop.
pub struct Subscription {
    store: Weak<CacheStore>,
    key: CacheKey,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade()
            && let Some(mut slot) = store.slots.get_mut(&self.key)
        {
            slot.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

fn collect_listeners(slot: &Slot) -> Vec<Listener> {
    slot.listeners.iter().map(|(_, l)| l.clone()).collect()
}

// Listeners run outside the shard lock so they may freely read the store.
fn notify(listeners: Vec<Listener>) {
    for listener in listeners {
        listener();
    }
}
