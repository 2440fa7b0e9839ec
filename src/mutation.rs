//! Optimistic mutation engine.
//!
//! A mutation applies its local cache edit before the network confirms it,
//! and restores the pre-mutation snapshot if the remote call fails. The
//! protocol order is fixed:
//!
//! 1. cancel in-flight fetches for the key, so a stale read started before
//!    the mutation cannot clobber the optimistic write,
//! 2. snapshot the current entry,
//! 3. apply the local transform synchronously,
//! 4. await the remote operation,
//! 5. on success, optionally reconcile server-assigned data (placeholder
//!    ids); on failure, restore the snapshot and re-surface the error.
//!
//! Local transforms are a closed set of tagged operations ([`ListOp`] for
//! collection entries, domain-specific [`EntryOp`] impls for aggregates)
//! rather than ad hoc object shapes. A transform whose target id is absent
//! from the entry is a no-op at the value level; absence is not an error
//! at the cache layer.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::error::Result;
use crate::key::CacheKey;
use crate::store::CacheStore;
use crate::types::ItemId;

/// Behavior an entity DTO needs for the generic list operations.
pub trait CacheItem: Clone + Send + Sync + 'static {
    type Patch: Clone + Send + Sync + 'static;
    type Toggle: Copy + Send + Sync + 'static;

    fn item_id(&self) -> ItemId;
    fn apply_patch(&mut self, patch: &Self::Patch);
    fn toggle(&mut self, field: Self::Toggle);
}

/// Patch type for items with no patchable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NoPatch;

/// Toggle type for items with no toggleable fields. Uninhabited, so a
/// toggle op on such an item cannot even be constructed.
#[derive(Debug, Clone, Copy)]
pub enum NoToggle {}

/// A local transform of one cache entry. Must be pure: it sees the previous
/// value and returns the next one, never touching the store itself.
pub trait EntryOp<E>: Send {
    fn apply(&self, prev: Option<&E>) -> E;
}

/// The closed set of transforms over a cached collection.
pub enum ListOp<T: CacheItem> {
    Insert(T),
    Patch { id: ItemId, patch: T::Patch },
    Remove { id: ItemId },
    Toggle { id: ItemId, field: T::Toggle },
}

impl<T: CacheItem> EntryOp<Vec<T>> for ListOp<T> {
    fn apply(&self, prev: Option<&Vec<T>>) -> Vec<T> {
        let mut next: Vec<T> = prev.cloned().unwrap_or_default();
        match self {
            ListOp::Insert(item) => next.push(item.clone()),
            ListOp::Patch { id, patch } => {
                if let Some(item) = next.iter_mut().find(|i| i.item_id() == *id) {
                    item.apply_patch(patch);
                }
            }
            ListOp::Remove { id } => next.retain(|i| i.item_id() != *id),
            ListOp::Toggle { id, field } => {
                if let Some(item) = next.iter_mut().find(|i| i.item_id() == *id) {
                    item.toggle(*field);
                }
            }
        }
        next
    }
}

/// Observable state of one engine (one engine per writable operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Mutating,
    Succeeded,
    Failed,
}

/// Hands out unique negative ids for optimistically created rows, so
/// multiple in-flight creations never collide within one cache entry.
pub struct PlaceholderIds(AtomicI64);

impl PlaceholderIds {
    pub const fn new() -> Self {
        PlaceholderIds(AtomicI64::new(-1))
    }

    pub fn next(&self) -> ItemId {
        self.0.fetch_sub(1, Ordering::Relaxed)
    }

    pub fn is_placeholder(id: ItemId) -> bool {
        id < 0
    }
}

impl Default for PlaceholderIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the optimistic protocol for one cache key.
///
/// Mutations on the same key are serialized, across every engine that
/// targets it: the second invocation takes its snapshot only after the first
/// one settles, so a rollback can never erase a concurrently confirmed edit.
/// Engines on different keys interleave freely.
pub struct OptimisticEngine<E> {
    store: Arc<CacheStore>,
    key: CacheKey,
    status: Mutex<MutationStatus>,
    serial: Arc<AsyncMutex<()>>,
    _entry: PhantomData<fn() -> E>,
}

impl<E: Clone + Send + Sync + 'static> OptimisticEngine<E> {
    pub fn new(store: Arc<CacheStore>, key: CacheKey) -> Self {
        let serial = store.mutation_lock(&key);
        OptimisticEngine {
            store,
            key,
            status: Mutex::new(MutationStatus::Idle),
            serial,
            _entry: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn status(&self) -> MutationStatus {
        *self.status.lock()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == MutationStatus::Mutating
    }

    pub fn is_success(&self) -> bool {
        self.status() == MutationStatus::Succeeded
    }

    /// Run one optimistic mutation. The error from a failed remote call is
    /// re-surfaced after rollback completes, never swallowed.
    pub async fn mutate<Out, Fut>(&self, op: impl EntryOp<E>, remote: Fut) -> Result<Out>
    where
        Fut: Future<Output = Result<Out>>,
    {
        self.run(op, remote, |_| {}).await
    }

    async fn run<Out, Fut>(
        &self,
        op: impl EntryOp<E>,
        remote: Fut,
        reconcile: impl FnOnce(&Out),
    ) -> Result<Out>
    where
        Fut: Future<Output = Result<Out>>,
    {
        let _serial = self.serial.lock().await;
        *self.status.lock() = MutationStatus::Mutating;

        self.store.cancel_pending(&self.key);
        let snapshot: Option<Arc<E>> = self.store.get::<E>(&self.key);
        self.store.update::<E>(&self.key, |prev| op.apply(prev));
        debug!(key = %self.key, "optimistic edit applied");

        match remote.await {
            Ok(out) => {
                reconcile(&out);
                *self.status.lock() = MutationStatus::Succeeded;
                Ok(out)
            }
            Err(e) => {
                self.store.restore(&self.key, snapshot);
                debug!(key = %self.key, error = %e, "remote call failed; snapshot restored");
                *self.status.lock() = MutationStatus::Failed;
                Err(e)
            }
        }
    }
}

impl<T: CacheItem> OptimisticEngine<Vec<T>> {
    /// Optimistically insert `placeholder`, then swap it for the
    /// server-assigned row once the remote create resolves. The swap matches
    /// on the placeholder id only, never on field equality, so concurrent
    /// creations with distinct placeholders reconcile independently.
    pub async fn mutate_insert<Fut>(&self, placeholder: T, remote: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let placeholder_id = placeholder.item_id();
        self.run(ListOp::Insert(placeholder), remote, |confirmed: &T| {
            let confirmed = confirmed.clone();
            self.store.update::<Vec<T>>(&self.key, |prev| {
                let mut next: Vec<T> = prev.cloned().unwrap_or_default();
                if let Some(row) = next.iter_mut().find(|i| i.item_id() == placeholder_id) {
                    *row = confirmed;
                }
                next
            });
        })
        .await
    }
}
